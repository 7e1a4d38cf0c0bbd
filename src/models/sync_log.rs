use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// 同步数据来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncSource {
    Ftp,
    Upload,
}

/// 一次成功同步的审计记录 (只追加)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncLogEntry {
    pub timestamp: DateTime<Utc>,
    pub source: SyncSource,
    pub created: Vec<String>,
    pub updated: Vec<String>,
    #[serde(default)]
    pub articles_created: usize,
    #[serde(default)]
    pub articles_updated: usize,
}

/// 库存快照摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockSnapshot {
    pub taken_at: DateTime<Utc>,
    pub product_count: usize,
    pub article_count: usize,
    pub total_stock: i64,
}

/// settings 集合中的同步水位
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Watermark {
    pub last_modified: DateTime<Utc>,
    pub synced_at: DateTime<Utc>,
}

impl Watermark {
    pub const DOCUMENT_ID: &'static str = "lastSync";
}

/// 每日商品销量 (dailyProductSales)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyProductSales {
    pub date: NaiveDate,
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
}

impl DailyProductSales {
    pub fn document_id(date: NaiveDate, product_id: &str) -> String {
        format!("{}_{}", date.format("%Y-%m-%d"), product_id)
    }
}
