pub mod health;
pub mod ingest;
pub mod runs;

use crate::analytics::AnalyticsRouter;
use crate::db::Repository;
use crate::ingest::Ingestor;
use crate::jobs::JobCoordinator;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub ingestor: Arc<Ingestor>,
    pub analytics: Arc<AnalyticsRouter>,
    pub jobs: Arc<JobCoordinator>,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, jobs: Arc<JobCoordinator>) -> Self {
        let ingestor = Arc::new(Ingestor::new(repo.clone(), jobs.clone()));
        let analytics = Arc::new(AnalyticsRouter::new(repo.clone()));
        Self {
            repo,
            ingestor,
            analytics,
            jobs,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/ingest/strategy", post(ingest::post_strategy))
        .route("/v1/ingest/instance", post(ingest::post_instance))
        .route("/v1/ingest/run", post(ingest::post_run))
        .route("/v1/ingest/run-end", post(ingest::post_run_end))
        .route("/v1/ingest/order", post(ingest::post_order))
        .route("/v1/ingest/orders", post(ingest::post_orders))
        .route("/v1/ingest/execution", post(ingest::post_execution))
        .route("/v1/ingest/executions", post(ingest::post_executions))
        .route("/v1/ingest/bar", post(ingest::post_bar))
        .route("/v1/ingest/bars", post(ingest::post_bars))
        .route("/v1/ingest/stream", post(ingest::post_stream))
        .route("/v1/runs/:id", get(runs::get_run))
        .route("/v1/runs/:id/trades", get(runs::get_trades))
        .route("/v1/runs/:id/executions", get(runs::get_executions))
        .route("/v1/runs/:id/bars", get(runs::get_bars))
        .route("/v1/runs/:id/metrics", get(runs::get_metrics))
        .route(
            "/v1/runs/:id/regime-performance",
            get(runs::get_regime_performance),
        )
        .route("/v1/runs/:id/rebuild", post(runs::post_rebuild))
        .route("/v1/runs/:id/cancel", post(runs::post_cancel))
        .layer(cors)
        .with_state(state)
}
