use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde_json::{Value, json};

use crate::services::HealthProbe;

#[derive(Clone)]
struct HealthState {
    service: &'static str,
    probe: Arc<dyn HealthProbe>,
}

/// `/healthz` always answers; `/readyz` checks the store.
pub fn router(service: &'static str, probe: Arc<dyn HealthProbe>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .with_state(HealthState { service, probe })
}

async fn healthz(State(state): State<HealthState>) -> Json<Value> {
    Json(json!({ "status": "ok", "service": state.service }))
}

async fn readyz(State(state): State<HealthState>) -> (StatusCode, Json<Value>) {
    match state.probe.ready().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ready", "service": state.service })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable", "service": state.service, "message": e.to_string() })),
            )
        }
    }
}
