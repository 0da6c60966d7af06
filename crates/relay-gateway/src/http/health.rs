use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health — liveness check; degraded when the store is unreachable.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let store = match state.jobs.ping().await {
        Ok(()) => "ok",
        Err(_) => "unreachable",
    };
    Json(json!({
        "status": if store == "ok" { "ok" } else { "degraded" },
        "store": store,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
