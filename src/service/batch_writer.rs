use crate::db::DocumentStore;
use crate::error::StoreError;
use crate::models::WriteOp;

/// 单批操作上限
pub const BATCH_CEILING: usize = 500;

/// 写入统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub batches: usize,
    pub operations: usize,
}

/// 分批写入器
///
/// 操作累积到上限即提交，等待提交完成后才继续累积；`finish` 提交最后不满一批的部分。
/// 某批失败时之前已提交的批次不会回滚。
pub struct BatchWriter<'a> {
    store: &'a dyn DocumentStore,
    ceiling: usize,
    pending: Vec<WriteOp>,
    summary: WriteSummary,
}

impl<'a> BatchWriter<'a> {
    pub fn new(store: &'a dyn DocumentStore, ceiling: usize) -> Self {
        let ceiling = ceiling.clamp(1, BATCH_CEILING);
        Self {
            store,
            ceiling,
            pending: Vec::with_capacity(ceiling),
            summary: WriteSummary::default(),
        }
    }

    pub async fn push(&mut self, op: WriteOp) -> Result<(), StoreError> {
        self.pending.push(op);
        if self.pending.len() >= self.ceiling {
            self.flush().await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), StoreError> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let batch = std::mem::replace(&mut self.pending, Vec::with_capacity(self.ceiling));
        self.store.commit(&batch).await?;

        self.summary.batches += 1;
        self.summary.operations += batch.len();
        tracing::debug!(
            "Batch {} committed ({} ops, {} total)",
            self.summary.batches,
            batch.len(),
            self.summary.operations
        );
        Ok(())
    }

    pub async fn finish(mut self) -> Result<WriteSummary, StoreError> {
        self.flush().await?;
        Ok(self.summary)
    }
}
