//! Internal-token authentication for the ingestion API. Callers present the
//! same HS512 token the engine sends with callbacks; verified claims ride on
//! the request as an extension.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use axum::Json;
use relay_core::TOKEN_HEADER;
use serde_json::{json, Value};
use tracing::warn;

use crate::app::AppState;

pub async fn require_token(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<Value>)> {
    let token = req
        .headers()
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| auth_error("missing internal-api-token header"))?;

    let claims = state
        .tokens
        .verify(token)
        .map_err(|e| auth_error(&e.to_string()))?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

fn auth_error(reason: &str) -> (StatusCode, Json<Value>) {
    warn!(reason = %reason, "request authentication failed");
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": "authentication failed", "reason": reason})),
    )
}
