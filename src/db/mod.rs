pub mod memory;
pub mod pool;
pub mod postgres;
pub mod store;

pub use memory::MemoryStore;
pub use pool::{create_pool, ensure_schema};
pub use postgres::PgDocumentStore;
pub use store::DocumentStore;
