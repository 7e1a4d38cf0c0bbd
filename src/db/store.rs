use crate::error::StoreError;
use crate::models::{Document, StoredDocument, WriteOp};
use async_trait::async_trait;

/// 文档存储抽象
///
/// 生产环境为 PostgreSQL JSONB 表，测试使用内存实现。
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// 读取集合内全部文档
    async fn list(&self, collection: &'static str) -> Result<Vec<StoredDocument>, StoreError>;

    async fn get(
        &self,
        collection: &'static str,
        id: &str,
    ) -> Result<Option<StoredDocument>, StoreError>;

    /// 原子提交一批写操作：要么全部生效，要么全部不生效
    async fn commit(&self, ops: &[WriteOp]) -> Result<(), StoreError>;

    /// 追加一条文档，返回生成的 id
    async fn append(&self, collection: &'static str, data: Document) -> Result<String, StoreError>;
}
