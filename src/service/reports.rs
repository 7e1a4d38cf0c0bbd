use crate::db::DocumentStore;
use crate::error::StoreError;
use crate::models::{collections, ConsolidatedItem, DailyProductSales, SyncLogEntry};
use chrono::{Duration, NaiveDate};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// 畅销商品
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopSeller {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
}

/// 只读报表
pub struct ReportService {
    store: Arc<dyn DocumentStore>,
}

impl ReportService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// 最近的同步日志，新的在前
    pub async fn recent_logs(&self, limit: usize) -> Result<Vec<SyncLogEntry>, StoreError> {
        let docs = self.store.list(collections::LOGS).await?;
        let mut entries: Vec<SyncLogEntry> = docs
            .into_iter()
            .filter_map(|doc| {
                serde_json::from_value(Value::Object(doc.data))
                    .map_err(|e| tracing::warn!("Unreadable log entry {}: {}", doc.id, e))
                    .ok()
            })
            .collect();

        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(limit);
        Ok(entries)
    }

    /// 商品的按尺码汇总视图，商品不存在时返回 None
    pub async fn consolidated(&self, product_id: &str) -> Result<Option<ConsolidatedItem>, StoreError> {
        let product = self.store.get(collections::PRODUCTS, product_id).await?;
        Ok(product.map(|doc| ConsolidatedItem::from_document(&doc.id, &doc.data)))
    }

    /// 最近 `days` 天（含今天）销量最高的商品
    pub async fn top_sellers(
        &self,
        today: NaiveDate,
        days: u32,
        limit: usize,
    ) -> Result<Vec<TopSeller>, StoreError> {
        // 天数过大时窗口从最早可表示的日期开始
        let since = today
            .checked_sub_signed(Duration::days(i64::from(days.max(1)) - 1))
            .unwrap_or(NaiveDate::MIN);
        let docs = self.store.list(collections::DAILY_PRODUCT_SALES).await?;

        let mut totals: IndexMap<String, TopSeller> = IndexMap::new();
        for doc in docs {
            let sales: DailyProductSales = match serde_json::from_value(Value::Object(doc.data)) {
                Ok(sales) => sales,
                Err(e) => {
                    tracing::warn!("Unreadable daily sales entry {}: {}", doc.id, e);
                    continue;
                }
            };
            if sales.date < since || sales.date > today {
                continue;
            }

            let seller = totals
                .entry(sales.product_id.clone())
                .or_insert_with(|| TopSeller {
                    product_id: sales.product_id,
                    product_name: sales.product_name,
                    quantity: 0,
                });
            seller.quantity = seller.quantity.saturating_add(sales.quantity);
        }

        let mut sellers: Vec<TopSeller> = totals.into_values().collect();
        sellers.sort_by(|a, b| {
            b.quantity
                .cmp(&a.quantity)
                .then_with(|| a.product_name.cmp(&b.product_name))
        });
        sellers.truncate(limit);
        Ok(sellers)
    }
}
