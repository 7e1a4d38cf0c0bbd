pub mod batch_writer;
pub mod grouping;
pub mod ingest;
pub mod reconcile;
pub mod reports;
pub mod sync;

pub use batch_writer::{BatchWriter, WriteSummary, BATCH_CEILING};
pub use grouping::{group_rows, Grouping, SupplierColumns, UNKNOWN_SUPPLIER};
pub use ingest::{parse_inventory, FileSource, FtpSource, InventoryFile};
pub use reconcile::{compute_delta, plan_changes, Snapshot, SyncPlan};
pub use reports::{ReportService, TopSeller};
pub use sync::{SyncOutcome, SyncReport, SyncService, SyncSettings};
