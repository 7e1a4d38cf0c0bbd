pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod service;

pub use config::AppConfig;
pub use db::{create_pool, DocumentStore, MemoryStore, PgDocumentStore};
pub use error::{StoreError, SyncError, TransferError};
pub use service::{ReportService, SyncService};
