use crate::db::store::DocumentStore;
use crate::error::StoreError;
use crate::models::{Document, StoredDocument, WriteOp};
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// 单批提交超时（秒）
const COMMIT_TIMEOUT_SECS: u64 = 30;

/// PostgreSQL 文档存储：`documents` 表，一行一个文档
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn apply(&self, ops: &[WriteOp]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        // 连续的 Create 合并为一条多行 INSERT，其余按顺序逐条执行
        let mut pending_creates: Vec<(&'static str, &str, &Document)> = Vec::new();
        for op in ops {
            if let WriteOp::Create { collection, id, data } = op {
                pending_creates.push((*collection, id.as_str(), data));
                continue;
            }
            insert_many(&mut tx, &pending_creates).await?;
            pending_creates.clear();

            match op {
                WriteOp::Update { collection, id, patch } => {
                    let result = sqlx::query(
                        r#"
                        UPDATE documents
                        SET data = data || $3, updated_at = now()
                        WHERE collection = $1 AND id = $2
                        "#,
                    )
                    .bind(*collection)
                    .bind(id)
                    .bind(Json(patch))
                    .execute(&mut *tx)
                    .await?;

                    if result.rows_affected() == 0 {
                        return Err(StoreError::Rejected(format!(
                            "update of missing document {}/{}",
                            collection, id
                        )));
                    }
                }
                WriteOp::Set { collection, id, data } => {
                    sqlx::query(
                        r#"
                        INSERT INTO documents (collection, id, data)
                        VALUES ($1, $2, $3)
                        ON CONFLICT (collection, id)
                        DO UPDATE SET data = EXCLUDED.data, updated_at = now()
                        "#,
                    )
                    .bind(*collection)
                    .bind(id)
                    .bind(Json(data))
                    .execute(&mut *tx)
                    .await?;
                }
                WriteOp::Increment {
                    collection,
                    id,
                    field,
                    amount,
                    seed,
                } => {
                    sqlx::query(
                        r#"
                        INSERT INTO documents (collection, id, data)
                        VALUES ($1, $2, $3::jsonb || jsonb_build_object($4::text, $5::bigint))
                        ON CONFLICT (collection, id)
                        DO UPDATE SET
                            data = documents.data || jsonb_build_object(
                                $4::text,
                                COALESCE((documents.data ->> $4)::bigint, 0) + $5::bigint
                            ),
                            updated_at = now()
                        "#,
                    )
                    .bind(*collection)
                    .bind(id)
                    .bind(Json(seed))
                    .bind(field)
                    .bind(*amount)
                    .execute(&mut *tx)
                    .await?;
                }
                WriteOp::Create { .. } => {}
            }
        }
        insert_many(&mut tx, &pending_creates).await?;

        tx.commit().await?;
        Ok(())
    }
}

/// 多行 INSERT
async fn insert_many(
    tx: &mut Transaction<'_, Postgres>,
    rows: &[(&'static str, &str, &Document)],
) -> Result<(), StoreError> {
    if rows.is_empty() {
        return Ok(());
    }

    let mut query_builder =
        sqlx::QueryBuilder::<Postgres>::new("INSERT INTO documents (collection, id, data) ");
    query_builder.push_values(rows, |mut b, (collection, id, data)| {
        b.push_bind(*collection).push_bind(*id).push_bind(Json(*data));
    });

    query_builder.build().execute(&mut **tx).await?;
    Ok(())
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn list(&self, collection: &'static str) -> Result<Vec<StoredDocument>, StoreError> {
        let rows = sqlx::query_as::<_, (String, Json<Document>)>(
            r#"
            SELECT id, data
            FROM documents
            WHERE collection = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, Json(data))| StoredDocument::new(id, data))
            .collect())
    }

    async fn get(
        &self,
        collection: &'static str,
        id: &str,
    ) -> Result<Option<StoredDocument>, StoreError> {
        let row = sqlx::query_as::<_, (String, Json<Document>)>(
            r#"
            SELECT id, data
            FROM documents
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, Json(data))| StoredDocument::new(id, data)))
    }

    async fn commit(&self, ops: &[WriteOp]) -> Result<(), StoreError> {
        if ops.is_empty() {
            return Ok(());
        }

        tracing::debug!("开始提交批次, {} 个操作", ops.len());
        let start_time = Instant::now();

        let result = tokio::time::timeout(
            Duration::from_secs(COMMIT_TIMEOUT_SECS),
            self.apply(ops),
        )
        .await;

        match result {
            Ok(Ok(())) => {
                tracing::info!("✓ 批次提交成功, {} 个操作, 耗时: {:?}", ops.len(), start_time.elapsed());
                Ok(())
            }
            Ok(Err(e)) => {
                tracing::error!("✗ 批次提交失败, 耗时: {:?}, 错误: {:?}", start_time.elapsed(), e);
                Err(e)
            }
            Err(_) => {
                tracing::error!("✗ 批次提交超时 (>{}秒)!", COMMIT_TIMEOUT_SECS);
                Err(StoreError::Timeout(COMMIT_TIMEOUT_SECS))
            }
        }
    }

    async fn append(&self, collection: &'static str, data: Document) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(collection)
        .bind(&id)
        .bind(Json(&data))
        .execute(&self.pool)
        .await?;

        Ok(id)
    }
}
