use crate::models::{ConsolidatedItem, SyncLogEntry};
use crate::service::{ReportService, SyncOutcome, SyncService, TopSeller};
use axum::{
    body::Bytes,
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 成功响应
#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub message: String,
}

/// 失败响应（不包含内部错误细节）
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct TopSellersQuery {
    pub days: Option<u32>,
    pub limit: Option<usize>,
}

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

fn sync_response(result: Result<SyncOutcome, crate::error::SyncError>) -> Response {
    match result {
        Ok(outcome) => {
            let response = SyncResponse {
                message: outcome.message(),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            tracing::error!("Inventory sync failed: {}", e);
            let response = ErrorResponse {
                error: "Inventory sync failed".to_string(),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response()
        }
    }
}

/// 从 FTP 同步库存
pub async fn run_sync(State(service): State<Arc<SyncService>>) -> Response {
    sync_response(service.sync_from_source().await)
}

/// 以请求体中的 CSV 同步库存
pub async fn upload_sync(State(service): State<Arc<SyncService>>, body: Bytes) -> Response {
    sync_response(service.sync_from_upload(&body).await)
}

fn store_failure(e: crate::error::StoreError) -> Response {
    tracing::error!("Report query failed: {}", e);
    let response = ErrorResponse {
        error: "Store unavailable".to_string(),
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response()
}

/// 最近同步日志
pub async fn sync_logs(
    State(reports): State<Arc<ReportService>>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Vec<SyncLogEntry>>, Response> {
    reports
        .recent_logs(query.limit.unwrap_or(20))
        .await
        .map(Json)
        .map_err(store_failure)
}

/// 商品按尺码汇总
pub async fn consolidated_product(
    State(reports): State<Arc<ReportService>>,
    Path(product_id): Path<String>,
) -> Result<Json<ConsolidatedItem>, Response> {
    match reports.consolidated(&product_id).await {
        Ok(Some(view)) => Ok(Json(view)),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Product {} not found", product_id),
            }),
        )
            .into_response()),
        Err(e) => Err(store_failure(e)),
    }
}

/// 畅销商品
pub async fn top_sellers(
    State(reports): State<Arc<ReportService>>,
    Query(query): Query<TopSellersQuery>,
) -> Result<Json<Vec<TopSeller>>, Response> {
    reports
        .top_sellers(
            Utc::now().date_naive(),
            query.days.unwrap_or(30),
            query.limit.unwrap_or(10),
        )
        .await
        .map(Json)
        .map_err(store_failure)
}
