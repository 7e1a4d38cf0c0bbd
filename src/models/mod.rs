pub mod article;
pub mod document;
pub mod product;
pub mod sync_log;

pub use article::{ArticleKey, ArticleRecord, CsvRow};
pub use document::{collections, Document, StoredDocument, WriteOp};
pub use product::{ConsolidatedItem, MetricSeries, ProductAggregate, ProductKey};
pub use sync_log::{DailyProductSales, StockSnapshot, SyncLogEntry, SyncSource, Watermark};
