#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use inventory_sync::error::TransferError;
use inventory_sync::service::{FileSource, SupplierColumns, SyncSettings};
use inventory_sync::{MemoryStore, SyncService};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const HEADER: &str = "Item number;Size;Color;Brand;Product name;Category;Stock;SKU;Season;Sold;In Purchase;Leverandør";

/// 固定内容的文件来源，可模拟传输失败
pub struct StaticSource {
    modified: DateTime<Utc>,
    body: Mutex<Vec<u8>>,
    fail: bool,
    pub fetches: AtomicUsize,
}

impl StaticSource {
    pub fn new(modified: DateTime<Utc>, body: &str) -> Self {
        Self {
            modified,
            body: Mutex::new(body.as_bytes().to_vec()),
            fail: false,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            fail: true,
            ..Self::new(at(0), "")
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileSource for StaticSource {
    async fn last_modified(&self) -> Result<DateTime<Utc>, TransferError> {
        if self.fail {
            return Err(TransferError::Connect {
                host: "ftp.test:21".into(),
                reason: "connection refused".into(),
            });
        }
        Ok(self.modified)
    }

    async fn fetch(&self) -> Result<Vec<u8>, TransferError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.body.lock().unwrap().clone())
    }
}

/// 2026-03-01 00:00:00 UTC 之后 `hours` 小时
pub fn at(hours: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap() + chrono::Duration::hours(hours)
}

pub fn settings(staging: &Path) -> SyncSettings {
    SyncSettings {
        batch_size: 500,
        supplier_columns: SupplierColumns::new(["Supplier", "Leverandør", "Leverandor", "Vendor"]),
        staging_dir: staging.to_path_buf(),
    }
}

pub fn service(
    store: &Arc<MemoryStore>,
    source: Arc<StaticSource>,
    staging: &Path,
) -> SyncService {
    SyncService::new(store.clone(), source, settings(staging))
}

/// 拼接表头与数据行
pub fn csv(rows: &[&str]) -> String {
    let mut out = String::from(HEADER);
    for row in rows {
        out.push('\n');
        out.push_str(row);
    }
    out.push('\n');
    out
}
