//! Job ingestion endpoint — POST /api/v1/jobs.
//!
//! The caller's identity comes from the verified token claims, never from
//! the body, so a service can only enqueue jobs under its own name.

use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use relay_core::TokenClaims;
use relay_engine::schedule;
use relay_store::{MessageType, NewJob};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::app::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    /// Opaque JSON object delivered to the callback.
    pub payload: Value,
    pub callback_url: String,
    pub message_type: MessageType,
    /// Epoch seconds of the first dispatch; defaults to now.
    pub next_retry_at: Option<i64>,
    /// Cron expression, required for CRON and CONDITIONAL jobs.
    pub frequency: Option<String>,
    /// Execution budget for CRON jobs; -1 means unbounded.
    #[serde(default = "default_count")]
    pub count: i64,
    /// Fallback interval in seconds between CRON runs.
    #[serde(default)]
    pub time_duration: i64,
}

fn default_count() -> i64 {
    -1
}

/// POST /api/v1/jobs
///
/// Validates and enqueues a job as PENDING. Returns 201 with the job id.
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<TokenClaims>,
    Json(req): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    if let Err(reason) = validate(&req) {
        warn!(service = %claims.service_name, %reason, "job rejected");
        return Err((StatusCode::BAD_REQUEST, Json(json!({"error": reason}))));
    }

    let job = NewJob {
        payload: req.payload,
        callback_url: req.callback_url,
        next_retry_at: req.next_retry_at.unwrap_or_else(|| Utc::now().timestamp()),
        retry_count: 0,
        service_name: claims.service_name.clone(),
        user_id: claims.user_id.clone(),
        message_type: req.message_type,
        frequency: req.frequency,
        count: req.count,
        time_duration: req.time_duration,
    };

    let id = state.jobs.insert(job).await.map_err(|e| {
        warn!(service = %claims.service_name, error = %e, "job insert failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "internal error"})),
        )
    })?;

    info!(job_id = id, service = %claims.service_name, kind = %req.message_type, "job enqueued");
    Ok((StatusCode::CREATED, Json(json!({"data": {"id": id}}))))
}

fn validate(req: &CreateJobRequest) -> Result<(), String> {
    if !req.payload.is_object() {
        return Err("payload must be a JSON object".into());
    }

    let parsed = url::Url::parse(&req.callback_url)
        .map_err(|_| "callback_url must be an absolute URL".to_string())?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err("callback_url must use http or https".into());
    }

    match req.message_type {
        MessageType::Scheduled => Ok(()),
        MessageType::Cron => {
            if req.count != -1 && req.count <= 0 {
                return Err("count must be -1 or a positive number".into());
            }
            if req.time_duration <= 0 {
                return Err("time_duration must be positive for CRON jobs".into());
            }
            check_frequency(req.frequency.as_deref())
        }
        MessageType::Conditional => check_frequency(req.frequency.as_deref()),
    }
}

fn check_frequency(frequency: Option<&str>) -> Result<(), String> {
    let expr = frequency.ok_or_else(|| "frequency is required for recurring jobs".to_string())?;
    schedule::parse_frequency(expr).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(message_type: MessageType) -> CreateJobRequest {
        CreateJobRequest {
            payload: json!({"event": "ping"}),
            callback_url: "https://receiver.internal/hooks".into(),
            message_type,
            next_retry_at: None,
            frequency: None,
            count: -1,
            time_duration: 0,
        }
    }

    #[test]
    fn scheduled_job_needs_only_payload_and_url() {
        assert!(validate(&request(MessageType::Scheduled)).is_ok());
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let mut req = request(MessageType::Scheduled);
        req.payload = json!([1, 2, 3]);
        assert!(validate(&req).is_err());
    }

    #[test]
    fn relative_and_non_http_urls_are_rejected() {
        let mut req = request(MessageType::Scheduled);
        req.callback_url = "/hooks/local".into();
        assert!(validate(&req).is_err());
        req.callback_url = "ftp://receiver.internal/hooks".into();
        assert!(validate(&req).is_err());
    }

    #[test]
    fn cron_job_requires_frequency_and_interval() {
        let mut req = request(MessageType::Cron);
        req.time_duration = 60;
        assert!(validate(&req).is_err());

        req.frequency = Some("*/5 * * * *".into());
        assert!(validate(&req).is_ok());

        req.time_duration = 0;
        assert!(validate(&req).is_err());
    }

    #[test]
    fn cron_count_must_be_unbounded_or_positive() {
        let mut req = request(MessageType::Cron);
        req.frequency = Some("*/5 * * * *".into());
        req.time_duration = 60;
        req.count = 0;
        assert!(validate(&req).is_err());
        req.count = 10;
        assert!(validate(&req).is_ok());
    }

    #[test]
    fn conditional_job_requires_a_parseable_expression() {
        let mut req = request(MessageType::Conditional);
        assert!(validate(&req).is_err());
        req.frequency = Some("not a cron".into());
        assert!(validate(&req).is_err());
        req.frequency = Some("0 9 * * MON-FRI".into());
        assert!(validate(&req).is_ok());
    }
}
