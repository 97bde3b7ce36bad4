use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::{AppError, AppResult};
use crate::store::{merge_fields, CollectionPath, DocumentStore};

/// Process-local store, used with `--db-url memory://` and in tests.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: Mutex<HashMap<CollectionPath, Vec<(String, Value)>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get_all(&self, collection: CollectionPath) -> AppResult<Vec<Value>> {
        let collections = self.collections.lock().await;
        Ok(collections
            .get(&collection)
            .map(|records| records.iter().map(|(_, record)| record.clone()).collect())
            .unwrap_or_default())
    }

    async fn get_by_id(&self, collection: CollectionPath, id: &str) -> AppResult<Option<Value>> {
        let collections = self.collections.lock().await;
        Ok(collections.get(&collection).and_then(|records| {
            records
                .iter()
                .find(|(record_id, _)| record_id == id)
                .map(|(_, record)| record.clone())
        }))
    }

    async fn set_by_id(&self, collection: CollectionPath, id: &str, record: &Value) -> AppResult<()> {
        let mut collections = self.collections.lock().await;
        let records = collections.entry(collection).or_default();
        match records.iter_mut().find(|(record_id, _)| record_id == id) {
            Some((_, existing)) => *existing = record.clone(),
            None => records.push((id.to_string(), record.clone())),
        }
        Ok(())
    }

    async fn update_by_id(
        &self,
        collection: CollectionPath,
        id: &str,
        fields: &Value,
    ) -> AppResult<()> {
        let mut collections = self.collections.lock().await;
        let existing = collections
            .get_mut(&collection)
            .and_then(|records| records.iter_mut().find(|(record_id, _)| record_id == id))
            .ok_or_else(|| {
                AppError::NotFound(format!("document '{id}' not found in {}", collection.as_str()))
            })?;
        merge_fields(&mut existing.1, fields);
        Ok(())
    }

    async fn delete_by_id(&self, collection: CollectionPath, id: &str) -> AppResult<()> {
        let mut collections = self.collections.lock().await;
        let records = collections.entry(collection).or_default();
        let before = records.len();
        records.retain(|(record_id, _)| record_id != id);
        if records.len() == before {
            return Err(AppError::NotFound(format!(
                "document '{id}' not found in {}",
                collection.as_str()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn set_update_and_delete_round_trip() {
        let store = InMemoryDocumentStore::new();
        store
            .set_by_id(CollectionPath::Users, "u1", &json!({ "id": "u1", "name": "Ada" }))
            .await
            .expect("set should succeed");
        store
            .update_by_id(CollectionPath::Users, "u1", &json!({ "phone": "555" }))
            .await
            .expect("update should succeed");

        let record = store
            .get_by_id(CollectionPath::Users, "u1")
            .await
            .expect("get should succeed")
            .expect("record should exist");
        assert_eq!(record, json!({ "id": "u1", "name": "Ada", "phone": "555" }));
        assert!(store
            .get_all(CollectionPath::Projects)
            .await
            .expect("get_all should succeed")
            .is_empty());

        store
            .delete_by_id(CollectionPath::Users, "u1")
            .await
            .expect("delete should succeed");
        assert!(matches!(
            store.update_by_id(CollectionPath::Users, "u1", &json!({})).await,
            Err(AppError::NotFound(_))
        ));
    }
}
