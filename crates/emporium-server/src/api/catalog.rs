use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    routing::{delete, get},
};
use emporium_api::created;
use emporium_core::{CatalogItem, CatalogItemPatch, NewCatalogItem};

use super::{ApiJson, FlushResponse};
use crate::error::ServiceResult;
use crate::services::CatalogService;

pub fn router(service: Arc<CatalogService>) -> Router {
    Router::new()
        .route("/instruments", get(list_instruments).post(create_instrument))
        .route("/instruments/cache", delete(flush_cache))
        .route("/instruments/by-name/{name}", get(get_instrument_by_name))
        .route(
            "/instruments/{id}",
            get(get_instrument)
                .put(update_instrument)
                .delete(delete_instrument),
        )
        .with_state(service)
}

async fn create_instrument(
    State(service): State<Arc<CatalogService>>,
    ApiJson(new): ApiJson<NewCatalogItem>,
) -> ServiceResult<Response> {
    Ok(created(service.create(new).await?))
}

async fn list_instruments(
    State(service): State<Arc<CatalogService>>,
) -> ServiceResult<Json<Vec<CatalogItem>>> {
    Ok(Json(service.list().await?))
}

async fn get_instrument(
    State(service): State<Arc<CatalogService>>,
    Path(id): Path<String>,
) -> ServiceResult<Json<CatalogItem>> {
    Ok(Json(service.get(&id).await?))
}

async fn get_instrument_by_name(
    State(service): State<Arc<CatalogService>>,
    Path(name): Path<String>,
) -> ServiceResult<Json<CatalogItem>> {
    Ok(Json(service.get_by_name(&name).await?))
}

async fn update_instrument(
    State(service): State<Arc<CatalogService>>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<CatalogItemPatch>,
) -> ServiceResult<Json<CatalogItem>> {
    Ok(Json(service.update(&id, patch).await?))
}

async fn delete_instrument(
    State(service): State<Arc<CatalogService>>,
    Path(id): Path<String>,
) -> ServiceResult<StatusCode> {
    service.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn flush_cache(
    State(service): State<Arc<CatalogService>>,
) -> ServiceResult<Json<FlushResponse>> {
    let removed = service.flush_cache().await?;
    Ok(Json(FlushResponse { removed }))
}
