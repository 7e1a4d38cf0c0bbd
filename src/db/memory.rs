use crate::db::store::DocumentStore;
use crate::error::StoreError;
use crate::models::product::coerce_int;
use crate::models::{Document, StoredDocument, WriteOp};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

type Collections = HashMap<&'static str, IndexMap<String, Document>>;

/// 内存文档存储
///
/// 语义与 PostgreSQL 实现一致（批次原子、更新缺失文档报错），
/// 另外记录每次提交的批大小，并支持注入失败，供测试使用。
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<Collections>,
    commits: Mutex<Vec<usize>>,
    /// 第 N 次提交（从 1 开始）失败
    fail_commit_at: AtomicUsize,
    fail_appends: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置文档
    pub fn insert(&self, collection: &'static str, id: impl Into<String>, data: Document) {
        self.lock()
            .entry(collection)
            .or_default()
            .insert(id.into(), data);
    }

    /// 集合内全部文档（按写入顺序）
    pub fn documents(&self, collection: &'static str) -> Vec<StoredDocument> {
        self.lock()
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, data)| StoredDocument::new(id.clone(), data.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 每次成功提交的批大小
    pub fn commit_sizes(&self) -> Vec<usize> {
        self.commits
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn fail_commit_at(&self, nth: usize) {
        self.fail_commit_at.store(nth, Ordering::SeqCst);
    }

    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Collections> {
        self.collections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn apply_op(collections: &mut Collections, op: &WriteOp) -> Result<(), StoreError> {
    let docs = collections.entry(op.collection()).or_default();
    match op {
        WriteOp::Create { id, data, .. } => {
            if docs.contains_key(id) {
                return Err(StoreError::Rejected(format!("document {} already exists", id)));
            }
            docs.insert(id.clone(), data.clone());
        }
        WriteOp::Update { collection, id, patch } => {
            let Some(doc) = docs.get_mut(id) else {
                return Err(StoreError::Rejected(format!(
                    "update of missing document {}/{}",
                    collection, id
                )));
            };
            for (field, value) in patch {
                doc.insert(field.clone(), value.clone());
            }
        }
        WriteOp::Set { id, data, .. } => {
            docs.insert(id.clone(), data.clone());
        }
        WriteOp::Increment {
            id,
            field,
            amount,
            seed,
            ..
        } => {
            let doc = docs.entry(id.clone()).or_insert_with(|| seed.clone());
            let current = coerce_int(doc.get(field));
            doc.insert(field.clone(), Value::from(current.saturating_add(*amount)));
        }
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list(&self, collection: &'static str) -> Result<Vec<StoredDocument>, StoreError> {
        Ok(self.documents(collection))
    }

    async fn get(
        &self,
        collection: &'static str,
        id: &str,
    ) -> Result<Option<StoredDocument>, StoreError> {
        Ok(self
            .lock()
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|data| StoredDocument::new(id, data.clone())))
    }

    async fn commit(&self, ops: &[WriteOp]) -> Result<(), StoreError> {
        let mut commits = self
            .commits
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if self.fail_commit_at.load(Ordering::SeqCst) == commits.len() + 1 {
            return Err(StoreError::Rejected("injected commit failure".into()));
        }

        let mut collections = self.lock();
        let mut staged = collections.clone();
        for op in ops {
            apply_op(&mut staged, op)?;
        }
        *collections = staged;
        commits.push(ops.len());
        Ok(())
    }

    async fn append(&self, collection: &'static str, data: Document) -> Result<String, StoreError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected("injected append failure".into()));
        }
        let id = Uuid::new_v4().to_string();
        self.insert(collection, id.clone(), data);
        Ok(id)
    }
}
