use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    routing::{delete, get, post},
};
use emporium_api::created;
use emporium_core::{NewOrder, Order};

use super::ApiJson;
use crate::error::ServiceResult;
use crate::services::OrderService;

pub fn router(service: Arc<OrderService>) -> Router {
    Router::new()
        .route("/orders", post(create_order))
        .route("/users/{user_id}/orders", get(list_orders))
        .route("/users/{user_id}/orders/{order_id}", delete(delete_order))
        .with_state(service)
}

async fn create_order(
    State(service): State<Arc<OrderService>>,
    ApiJson(new): ApiJson<NewOrder>,
) -> ServiceResult<Response> {
    Ok(created(service.create(new).await?))
}

async fn list_orders(
    State(service): State<Arc<OrderService>>,
    Path(user_id): Path<String>,
) -> ServiceResult<Json<Vec<Order>>> {
    Ok(Json(service.list(&user_id).await?))
}

async fn delete_order(
    State(service): State<Arc<OrderService>>,
    Path((user_id, order_id)): Path<(String, String)>,
) -> ServiceResult<StatusCode> {
    service.delete(&user_id, &order_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
