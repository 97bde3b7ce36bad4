pub mod memory;
pub mod sql;
pub mod timestamps;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::AppResult;

pub use memory::InMemoryDocumentStore;
pub use sql::SqlDocumentStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CollectionPath {
    Projects,
    Users,
    Companies,
}

impl CollectionPath {
    pub const ALL: [CollectionPath; 3] = [Self::Companies, Self::Users, Self::Projects];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Projects => "/projects",
            Self::Users => "/users",
            Self::Companies => "/companies",
        }
    }
}

/// Keyed collections of JSON documents. Records are the serialized entity
/// shape; `update_by_id` is a shallow merge where a `null` field deletes the
/// stored key.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_all(&self, collection: CollectionPath) -> AppResult<Vec<Value>>;

    async fn get_by_id(&self, collection: CollectionPath, id: &str) -> AppResult<Option<Value>>;

    async fn set_by_id(&self, collection: CollectionPath, id: &str, record: &Value) -> AppResult<()>;

    async fn update_by_id(
        &self,
        collection: CollectionPath,
        id: &str,
        fields: &Value,
    ) -> AppResult<()>;

    async fn delete_by_id(&self, collection: CollectionPath, id: &str) -> AppResult<()>;
}

pub fn merge_fields(target: &mut Value, fields: &Value) {
    let Some(fields) = fields.as_object() else {
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    let Some(target) = target.as_object_mut() else {
        return;
    };

    for (key, value) in fields {
        if value.is_null() {
            target.remove(key);
        } else {
            target.insert(key.clone(), value.clone());
        }
    }
}

/// Top-level keys that differ between two records; keys that disappeared map
/// to `null` so a merge removes them.
pub fn changed_fields(before: &Value, after: &Value) -> Value {
    let empty = Map::new();
    let before = before.as_object().unwrap_or(&empty);
    let after = after.as_object().unwrap_or(&empty);

    let mut changes = Map::new();
    for (key, value) in after {
        if before.get(key) != Some(value) {
            changes.insert(key.clone(), value.clone());
        }
    }
    for key in before.keys() {
        if !after.contains_key(key) {
            changes.insert(key.clone(), Value::Null);
        }
    }

    Value::Object(changes)
}
