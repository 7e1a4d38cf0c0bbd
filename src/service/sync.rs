use crate::config::SyncConfig;
use crate::db::DocumentStore;
use crate::error::SyncError;
use crate::models::{
    collections, Document, StockSnapshot, SyncLogEntry, SyncSource, Watermark, WriteOp,
};
use crate::service::batch_writer::BatchWriter;
use crate::service::grouping::{group_rows, SupplierColumns};
use crate::service::ingest::{parse_inventory, stage_file, FileSource};
use crate::service::reconcile::{mixed_type_fields, plan_changes, Snapshot};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// 同步参数
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub batch_size: usize,
    pub supplier_columns: SupplierColumns,
    pub staging_dir: PathBuf,
}

impl SyncSettings {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            supplier_columns: SupplierColumns::new(config.supplier_columns.iter().cloned()),
            staging_dir: config.staging_dir.clone(),
        }
    }
}

/// 一次同步的统计
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub source: SyncSource,
    pub products: usize,
    pub articles: usize,
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub articles_created: usize,
    pub articles_updated: usize,
    pub dropped_rows: usize,
    pub skipped_rows: usize,
    pub batches: usize,
    pub operations: usize,
}

/// 同步结果
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// 远端文件不比水位新，未做任何写入
    Skipped {
        remote: DateTime<Utc>,
        watermark: DateTime<Utc>,
    },
    Completed(SyncReport),
}

impl SyncOutcome {
    /// 返回给调用方的简要说明
    pub fn message(&self) -> String {
        match self {
            SyncOutcome::Skipped { .. } => "Inventory file unchanged since last sync".to_string(),
            SyncOutcome::Completed(report) => format!(
                "Sync completed: {} products created, {} updated; {} articles created, {} updated",
                report.created.len(),
                report.updated.len(),
                report.articles_created,
                report.articles_updated
            ),
        }
    }
}

/// 库存同步服务：下载 → 解析 → 分组 → 对账 → 分批写入 → 记录日志
pub struct SyncService {
    store: Arc<dyn DocumentStore>,
    source: Arc<dyn FileSource>,
    settings: SyncSettings,
}

impl SyncService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        source: Arc<dyn FileSource>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            store,
            source,
            settings,
        }
    }

    /// 从 FTP 同步；远端文件不比水位新时直接返回 `Skipped`
    pub async fn sync_from_source(&self) -> Result<SyncOutcome, SyncError> {
        let remote = self.source.last_modified().await?;

        if let Some(watermark) = self.load_watermark().await? {
            if remote <= watermark.last_modified {
                tracing::info!(
                    "Remote file modified at {} is not newer than last sync {}, skipping",
                    remote,
                    watermark.last_modified
                );
                return Ok(SyncOutcome::Skipped {
                    remote,
                    watermark: watermark.last_modified,
                });
            }
        }

        let bytes = self.source.fetch().await?;
        let path = stage_file(&self.settings.staging_dir, "inventory.csv", &bytes).await?;
        tracing::info!("Inventory file staged at {}", path.display());

        let report = self.run(&bytes, SyncSource::Ftp, Some(remote)).await?;
        Ok(SyncOutcome::Completed(report))
    }

    /// 手动上传的 CSV；不检查也不推进水位
    pub async fn sync_from_upload(&self, bytes: &[u8]) -> Result<SyncOutcome, SyncError> {
        let path = stage_file(&self.settings.staging_dir, "upload.csv", bytes).await?;
        tracing::info!("Uploaded inventory file staged at {}", path.display());

        let report = self.run(bytes, SyncSource::Upload, None).await?;
        Ok(SyncOutcome::Completed(report))
    }

    async fn load_watermark(&self) -> Result<Option<Watermark>, SyncError> {
        let Some(doc) = self
            .store
            .get(collections::SETTINGS, Watermark::DOCUMENT_ID)
            .await?
        else {
            return Ok(None);
        };

        match serde_json::from_value::<Watermark>(Value::Object(doc.data)) {
            Ok(watermark) => Ok(Some(watermark)),
            Err(e) => {
                tracing::warn!("Stored watermark unreadable ({}), running full sync", e);
                Ok(None)
            }
        }
    }

    async fn run(
        &self,
        bytes: &[u8],
        source: SyncSource,
        remote_modified: Option<DateTime<Utc>>,
    ) -> Result<SyncReport, SyncError> {
        let started = Utc::now();

        // 1. 解析与分组
        let file = parse_inventory(bytes)?;
        if file.rows.is_empty() {
            return Err(SyncError::EmptyDataset);
        }
        let grouping = group_rows(&file, &self.settings.supplier_columns);
        if grouping.products.is_empty() {
            return Err(SyncError::EmptyDataset);
        }

        // 2. 读取现有快照
        let (stored_products, stored_articles) = futures::try_join!(
            self.store.list(collections::PRODUCTS),
            self.store.list(collections::ARTICLES),
        )?;
        tracing::info!(
            "Loaded snapshot: {} products, {} articles",
            stored_products.len(),
            stored_articles.len()
        );
        for (collection, docs) in [
            (collections::PRODUCTS, &stored_products),
            (collections::ARTICLES, &stored_articles),
        ] {
            let mixed = mixed_type_fields(docs);
            if !mixed.is_empty() {
                tracing::warn!(
                    "Data quality: fields stored with mixed number/string types in {}: {:?}",
                    collection,
                    mixed
                );
            }
        }
        let snapshot = Snapshot::from_documents(stored_products, stored_articles);

        // 3. 对账
        let mut plan = plan_changes(&grouping, &snapshot, started);
        if let Some(last_modified) = remote_modified {
            plan.ops.push(watermark_op(last_modified, started)?);
        }
        tracing::info!(
            "Reconciled: {} products new, {} changed; {} articles new, {} changed; {} write ops",
            plan.created.len(),
            plan.updated.len(),
            plan.articles_created,
            plan.articles_updated,
            plan.ops.len()
        );

        // 4. 分批写入
        let mut writer = BatchWriter::new(self.store.as_ref(), self.settings.batch_size);
        let ops = std::mem::take(&mut plan.ops);
        for op in ops {
            writer.push(op).await?;
        }
        let summary = writer.finish().await?;

        let report = SyncReport {
            source,
            products: grouping.products.len(),
            articles: grouping.article_count(),
            created: plan.created,
            updated: plan.updated,
            articles_created: plan.articles_created,
            articles_updated: plan.articles_updated,
            dropped_rows: grouping.dropped_rows,
            skipped_rows: plan.skipped_rows + grouping.rejected_rows,
            batches: summary.batches,
            operations: summary.operations,
        };

        // 5. 审计日志与快照（失败不影响结果）
        self.append_log(&report, started).await;
        let stock = StockSnapshot {
            taken_at: started,
            product_count: report.products,
            article_count: report.articles,
            total_stock: grouping.total_stock(),
        };
        self.append_best_effort(collections::SNAPSHOTS, &stock).await;

        tracing::info!(
            "Sync finished in {} ms: {} batches, {} operations",
            (Utc::now() - started).num_milliseconds(),
            report.batches,
            report.operations
        );
        Ok(report)
    }

    async fn append_log(&self, report: &SyncReport, timestamp: DateTime<Utc>) {
        let entry = SyncLogEntry {
            timestamp,
            source: report.source,
            created: report.created.clone(),
            updated: report.updated.clone(),
            articles_created: report.articles_created,
            articles_updated: report.articles_updated,
        };
        self.append_best_effort(collections::LOGS, &entry).await;
    }

    async fn append_best_effort<T: Serialize>(&self, collection: &'static str, value: &T) {
        let data = match to_document(value) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("Cannot serialize {} entry: {}", collection, e);
                return;
            }
        };
        if let Err(e) = self.store.append(collection, data).await {
            tracing::warn!("Appending to {} failed, sync result kept: {}", collection, e);
        }
    }
}

fn watermark_op(last_modified: DateTime<Utc>, synced_at: DateTime<Utc>) -> Result<WriteOp, SyncError> {
    let data = to_document(&Watermark {
        last_modified,
        synced_at,
    })
    .map_err(crate::error::StoreError::from)?;

    Ok(WriteOp::Set {
        collection: collections::SETTINGS,
        id: Watermark::DOCUMENT_ID.to_string(),
        data,
    })
}

fn to_document<T: Serialize>(value: &T) -> Result<Document, serde_json::Error> {
    match serde_json::to_value(value)? {
        Value::Object(doc) => Ok(doc),
        other => Ok(Document::from_iter([("value".to_string(), other)])),
    }
}
