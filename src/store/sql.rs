use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Any, AnyPool};

use crate::error::{AppError, AppResult};
use crate::model::common::now_timestamp;
use crate::store::{merge_fields, CollectionPath, DocumentStore};

/// Documents persisted as JSON text in the `documents` table, ordered by
/// first insertion within a collection.
#[derive(Debug, Clone)]
pub struct SqlDocumentStore {
    pool: AnyPool,
}

impl SqlDocumentStore {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

fn parse_body(collection: CollectionPath, id: &str, body: &str) -> AppResult<Value> {
    serde_json::from_str(body).map_err(|error| {
        AppError::Store(format!(
            "stored document '{id}' in {} is not valid JSON: {error}",
            collection.as_str()
        ))
    })
}

fn encode_body(record: &Value) -> AppResult<String> {
    serde_json::to_string(record).map_err(|error| AppError::Store(error.to_string()))
}

#[async_trait]
impl DocumentStore for SqlDocumentStore {
    async fn get_all(&self, collection: CollectionPath) -> AppResult<Vec<Value>> {
        let rows = sqlx::query_as::<Any, (String, String)>(
            r#"
            SELECT id, body
            FROM documents
            WHERE collection = ?
            ORDER BY seq ASC
            "#,
        )
        .bind(collection.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|(id, body)| parse_body(collection, id, body))
            .collect()
    }

    async fn get_by_id(&self, collection: CollectionPath, id: &str) -> AppResult<Option<Value>> {
        let body = sqlx::query_scalar::<Any, String>(
            "SELECT body FROM documents WHERE collection = ? AND id = ?",
        )
        .bind(collection.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        body.map(|body| parse_body(collection, id, &body)).transpose()
    }

    async fn set_by_id(&self, collection: CollectionPath, id: &str, record: &Value) -> AppResult<()> {
        let now = now_timestamp();
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, seq, body, created_at, updated_at)
            VALUES (
                ?, ?,
                (SELECT COALESCE(MAX(seq), 0) + 1 FROM documents WHERE collection = ?),
                ?, ?, ?
            )
            ON CONFLICT (collection, id)
            DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at
            "#,
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(collection.as_str())
        .bind(encode_body(record)?)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_by_id(
        &self,
        collection: CollectionPath,
        id: &str,
        fields: &Value,
    ) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let body = sqlx::query_scalar::<Any, String>(
            "SELECT body FROM documents WHERE collection = ? AND id = ?",
        )
        .bind(collection.as_str())
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("document '{id}' not found in {}", collection.as_str()))
        })?;

        let mut record = parse_body(collection, id, &body)?;
        merge_fields(&mut record, fields);

        sqlx::query("UPDATE documents SET body = ?, updated_at = ? WHERE collection = ? AND id = ?")
            .bind(encode_body(&record)?)
            .bind(now_timestamp())
            .bind(collection.as_str())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_by_id(&self, collection: CollectionPath, id: &str) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "document '{id}' not found in {}",
                collection.as_str()
            )));
        }

        Ok(())
    }
}
