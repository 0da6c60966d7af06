//! Admission-control endpoint — PUT /api/v1/thresholds.

use axum::{extract::State, http::StatusCode, Extension, Json};
use relay_core::TokenClaims;
use relay_store::ThresholdUpdate;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::app::AppState;

#[derive(Debug, Deserialize)]
pub struct UpsertThresholdRequest {
    pub limit: i64,
    /// Window bounds, epoch seconds inclusive.
    pub start_time: i64,
    pub end_time: i64,
}

/// PUT /api/v1/thresholds
///
/// Creates or replaces the caller's threshold and revives any of its jobs
/// that admission control parked as DEAD.
pub async fn upsert_threshold(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<TokenClaims>,
    Json(req): Json<UpsertThresholdRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Err(reason) = validate(&req) {
        warn!(service = %claims.service_name, %reason, "threshold rejected");
        return Err((StatusCode::BAD_REQUEST, Json(json!({"error": reason}))));
    }

    let id = state
        .thresholds
        .upsert(ThresholdUpdate {
            service_name: claims.service_name.clone(),
            limit: req.limit,
            start_time: req.start_time,
            end_time: req.end_time,
        })
        .await
        .map_err(|e| {
            warn!(service = %claims.service_name, error = %e, "threshold upsert failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "internal error"})),
            )
        })?;

    info!(service = %claims.service_name, limit = req.limit, "threshold updated");
    Ok(Json(json!({"data": {"id": id}})))
}

fn validate(req: &UpsertThresholdRequest) -> Result<(), String> {
    if req.limit < 0 {
        return Err("limit must be non-negative".into());
    }
    if req.start_time >= req.end_time {
        return Err("start_time must be before end_time".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_must_be_ordered() {
        let req = UpsertThresholdRequest {
            limit: 10,
            start_time: 200,
            end_time: 100,
        };
        assert!(validate(&req).is_err());
    }

    #[test]
    fn negative_limit_is_rejected() {
        let req = UpsertThresholdRequest {
            limit: -1,
            start_time: 100,
            end_time: 200,
        };
        assert!(validate(&req).is_err());
    }

    #[test]
    fn zero_limit_is_a_valid_freeze() {
        let req = UpsertThresholdRequest {
            limit: 0,
            start_time: 100,
            end_time: 200,
        };
        assert!(validate(&req).is_ok());
    }
}
