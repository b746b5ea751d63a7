use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use emporium_core::{Basket, BasketItem};

use super::{ApiJson, FlushResponse};
use crate::error::ServiceResult;
use crate::services::BasketService;

pub fn router(service: Arc<BasketService>) -> Router {
    Router::new()
        .route("/carts/cache", delete(flush_cache))
        .route("/carts/{user_id}", get(get_cart).delete(clear_cart))
        .route("/carts/{user_id}/items", post(add_item))
        .route(
            "/carts/{user_id}/items/{instrument_id}",
            delete(remove_item),
        )
        .with_state(service)
}

async fn get_cart(
    State(service): State<Arc<BasketService>>,
    Path(user_id): Path<String>,
) -> ServiceResult<Json<Basket>> {
    Ok(Json(service.get(&user_id).await?))
}

async fn add_item(
    State(service): State<Arc<BasketService>>,
    Path(user_id): Path<String>,
    ApiJson(item): ApiJson<BasketItem>,
) -> ServiceResult<Json<Basket>> {
    Ok(Json(service.add_item(&user_id, item).await?))
}

async fn remove_item(
    State(service): State<Arc<BasketService>>,
    Path((user_id, instrument_id)): Path<(String, String)>,
) -> ServiceResult<Json<Basket>> {
    Ok(Json(service.remove_item(&user_id, &instrument_id).await?))
}

async fn clear_cart(
    State(service): State<Arc<BasketService>>,
    Path(user_id): Path<String>,
) -> ServiceResult<StatusCode> {
    service.clear(&user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn flush_cache(
    State(service): State<Arc<BasketService>>,
) -> ServiceResult<Json<FlushResponse>> {
    let removed = service.flush_cache().await?;
    Ok(Json(FlushResponse { removed }))
}
