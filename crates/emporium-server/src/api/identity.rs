use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    routing::{delete, get, post},
};
use emporium_api::created;
use emporium_core::{IdentityPatch, IdentityProfile, Registration};

use super::{ApiJson, FlushResponse};
use crate::error::ServiceResult;
use crate::services::{ConfirmRequest, ConfirmResponse, IdentityService, LoginRequest, LoginResponse};

pub fn router(service: Arc<IdentityService>) -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route("/users/confirm", post(confirm))
        .route("/users/cache", delete(flush_cache))
        .route("/users/by-email/{email}", get(get_user_by_email))
        .route(
            "/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .with_state(service)
}

async fn register(
    State(service): State<Arc<IdentityService>>,
    ApiJson(registration): ApiJson<Registration>,
) -> ServiceResult<Response> {
    let registered = service.register(registration).await?;
    Ok(created(registered))
}

async fn login(
    State(service): State<Arc<IdentityService>>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ServiceResult<Json<LoginResponse>> {
    Ok(Json(service.login(&request.email, &request.password).await?))
}

async fn confirm(
    State(service): State<Arc<IdentityService>>,
    ApiJson(request): ApiJson<ConfirmRequest>,
) -> ServiceResult<Json<ConfirmResponse>> {
    Ok(Json(service.confirm(&request.email, &request.code).await?))
}

async fn list_users(
    State(service): State<Arc<IdentityService>>,
) -> ServiceResult<Json<Vec<IdentityProfile>>> {
    Ok(Json(service.list().await?))
}

async fn get_user(
    State(service): State<Arc<IdentityService>>,
    Path(id): Path<String>,
) -> ServiceResult<Json<IdentityProfile>> {
    Ok(Json(service.get(&id).await?))
}

async fn get_user_by_email(
    State(service): State<Arc<IdentityService>>,
    Path(email): Path<String>,
) -> ServiceResult<Json<IdentityProfile>> {
    Ok(Json(service.get_by_email(&email).await?))
}

async fn update_user(
    State(service): State<Arc<IdentityService>>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<IdentityPatch>,
) -> ServiceResult<Json<IdentityProfile>> {
    Ok(Json(service.update(&id, patch).await?))
}

async fn delete_user(
    State(service): State<Arc<IdentityService>>,
    Path(id): Path<String>,
) -> ServiceResult<StatusCode> {
    service.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn flush_cache(
    State(service): State<Arc<IdentityService>>,
) -> ServiceResult<Json<FlushResponse>> {
    let removed = service.flush_cache().await?;
    Ok(Json(FlushResponse { removed }))
}
