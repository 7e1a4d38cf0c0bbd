pub mod handlers;

pub use handlers::*;

use crate::service::{ReportService, SyncService};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;

/// 构建全部路由
pub fn router(sync: Arc<SyncService>, reports: Arc<ReportService>, upload_limit: usize) -> Router {
    // 同步路由
    let sync_routes = Router::new()
        .route("/api/sync", post(run_sync))
        .route(
            "/api/sync/upload",
            post(upload_sync).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .with_state(sync);

    // 报表路由
    let report_routes = Router::new()
        .route("/api/sync/logs", get(sync_logs))
        .route("/api/products/:id/consolidated", get(consolidated_product))
        .route("/api/reports/top-sellers", get(top_sellers))
        .with_state(reports);

    Router::new()
        .route("/health", get(health_check))
        .merge(sync_routes)
        .merge(report_routes)
        .layer(ServiceBuilder::new())
}
