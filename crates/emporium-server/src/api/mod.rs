//! HTTP routes, one router per service.

pub mod basket;
pub mod catalog;
pub mod health;
pub mod identity;
pub mod order;

use axum::extract::FromRequest;
use emporium_api::ApiError;
use serde::Serialize;

/// JSON body extractor whose rejections use the `{error, message}` shape.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Body of the cache flush endpoints.
#[derive(Debug, Serialize)]
pub struct FlushResponse {
    pub removed: u64,
}
