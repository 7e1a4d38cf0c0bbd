use inventory_sync::db::ensure_schema;
use inventory_sync::service::{FtpSource, SyncSettings};
use inventory_sync::{api, create_pool, logging, AppConfig, PgDocumentStore, ReportService, SyncService};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载配置（缺少必填环境变量时直接退出）
    let config = AppConfig::from_env()?;

    // 初始化日志，guard 需存活到进程结束
    let _log_guard = logging::init(&config.logging)?;
    info!("Starting server with config: {:?}", config);

    // 创建数据库连接池
    let pool = create_pool(&config.database.url, config.database.max_connections).await?;
    ensure_schema(&pool).await?;
    info!("Database pool created");

    let store = Arc::new(PgDocumentStore::new(pool));
    let source = Arc::new(FtpSource::new(config.ftp.clone()));
    let sync_service = Arc::new(SyncService::new(
        store.clone(),
        source,
        SyncSettings::from_config(&config.sync),
    ));
    let report_service = Arc::new(ReportService::new(store));

    let app = api::router(sync_service, report_service, config.server.upload_limit);

    // 启动服务器
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  POST /api/sync                          - sync from FTP");
    info!("  POST /api/sync/upload                   - sync from uploaded CSV");
    info!("  GET  /api/sync/logs                     - recent sync runs");
    info!("  GET  /api/products/:id/consolidated     - per-size metrics");
    info!("  GET  /api/reports/top-sellers           - best sellers");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
