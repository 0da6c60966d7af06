use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::{middleware, Router};
use relay_core::config::RelayConfig;
use relay_core::TokenIssuer;
use relay_store::{JobStore, ThresholdStore};

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: RelayConfig,
    pub jobs: Arc<dyn JobStore>,
    pub thresholds: Arc<dyn ThresholdStore>,
    pub tokens: TokenIssuer,
}

impl AppState {
    pub fn new(
        config: RelayConfig,
        jobs: Arc<dyn JobStore>,
        thresholds: Arc<dyn ThresholdStore>,
        tokens: TokenIssuer,
    ) -> Self {
        Self {
            config,
            jobs,
            thresholds,
            tokens,
        }
    }
}

/// Assemble the full Axum router. API routes sit behind the internal-token
/// check; /health does not.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/api/v1/jobs", post(crate::http::jobs::create_job))
        .route(
            "/api/v1/thresholds",
            put(crate::http::thresholds::upsert_threshold),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_token,
        ));

    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .merge(api)
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
