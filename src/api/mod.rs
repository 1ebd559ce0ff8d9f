pub mod commissions;
pub mod earnings;
pub mod health;
pub mod settlements;

use crate::db::Repository;
use crate::orchestration::{LifecycleManager, SettlementBatch};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub batch: Arc<SettlementBatch>,
    pub lifecycle: Arc<LifecycleManager>,
}

impl AppState {
    pub fn new(
        repo: Arc<Repository>,
        batch: Arc<SettlementBatch>,
        lifecycle: Arc<LifecycleManager>,
    ) -> Self {
        Self {
            repo,
            batch,
            lifecycle,
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
        .route(
            "/v1/commissions",
            get(commissions::list_commissions).post(commissions::append_commission),
        )
        .route("/v1/settlements", get(settlements::list_settlements))
        .route("/v1/settlements/run", post(settlements::run_batch))
        .route("/v1/settlements/summary", get(settlements::get_summary))
        .route("/v1/settlements/export", get(settlements::export_settlements))
        .route("/v1/settlements/:id", get(settlements::get_settlement))
        .route(
            "/v1/settlements/:id/complete",
            post(settlements::complete_settlement),
        )
        .route(
            "/v1/settlements/:id/fail",
            post(settlements::fail_settlement),
        )
        .route("/v1/platform-earnings", get(earnings::list_platform_earnings))
        .layer(cors)
        .with_state(state)
}
