//! In-process [`Backend`] with the same observable contract as the hosted
//! service: backend-assigned `id`/`created_at`, not-found on unmatched
//! update/delete/single-select.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::{Backend, BackendError};

/// Columns the backend owns. Client-supplied values are discarded.
const SERVER_COLUMNS: [&str; 2] = ["id", "created_at"];

#[derive(Default)]
pub struct MemoryBackend {
    tables: RwLock<HashMap<String, Vec<Map<String, Value>>>>,
    round_trips: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of calls served so far, successful or not.
    pub fn round_trips(&self) -> usize {
        self.round_trips.load(Ordering::SeqCst)
    }

    fn tick(&self) {
        self.round_trips.fetch_add(1, Ordering::SeqCst);
    }
}

fn as_object(table: &str, value: Value) -> Result<Map<String, Value>, BackendError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(BackendError {
            message: format!("Expected a JSON object for {}, got {}", table, other),
            status: Some(400),
            code: Some("PGRST102".to_string()),
        }),
    }
}

fn row_id(row: &Map<String, Value>) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}

impl Backend for MemoryBackend {
    async fn select_all(&self, table: &str) -> Result<Vec<Value>, BackendError> {
        self.tick();
        let tables = self.tables.read().await;
        let rows = tables
            .get(table)
            .map(|rows| rows.iter().cloned().map(Value::Object).collect())
            .unwrap_or_default();
        Ok(rows)
    }

    async fn select_by_id(&self, table: &str, id: Uuid) -> Result<Value, BackendError> {
        self.tick();
        let id = id.to_string();
        let tables = self.tables.read().await;
        tables
            .get(table)
            .and_then(|rows| rows.iter().find(|row| row_id(row) == Some(id.as_str())))
            .map(|row| Value::Object(row.clone()))
            .ok_or_else(|| BackendError::not_found(table, &id))
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, BackendError> {
        self.tick();
        let mut row = as_object(table, row)?;
        for column in SERVER_COLUMNS {
            row.remove(column);
        }

        let id = Uuid::new_v4();
        row.insert("id".into(), Value::String(id.to_string()));
        row.insert("created_at".into(), Value::String(Utc::now().to_rfc3339()));

        debug!(table, %id, "memory insert");
        self.tables
            .write()
            .await
            .entry(table.to_string())
            .or_default()
            .push(row.clone());

        Ok(Value::Object(row))
    }

    async fn update(&self, table: &str, id: Uuid, changes: Value) -> Result<Value, BackendError> {
        self.tick();
        let changes = as_object(table, changes)?;
        let key = id.to_string();

        let mut tables = self.tables.write().await;
        let row = tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|row| row_id(row) == Some(key.as_str())))
            .ok_or_else(|| BackendError::not_found(table, id))?;

        for (column, value) in changes {
            if !SERVER_COLUMNS.contains(&column.as_str()) {
                row.insert(column, value);
            }
        }

        debug!(table, %id, "memory update");
        Ok(Value::Object(row.clone()))
    }

    async fn delete(&self, table: &str, id: Uuid) -> Result<(), BackendError> {
        self.tick();
        let key = id.to_string();

        let mut tables = self.tables.write().await;
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| BackendError::not_found(table, id))?;
        let before = rows.len();
        rows.retain(|row| row_id(row) != Some(key.as_str()));

        if rows.len() == before {
            return Err(BackendError::not_found(table, id));
        }
        debug!(table, %id, "memory delete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id_of(row: &Value) -> Uuid {
        row["id"].as_str().unwrap().parse().unwrap()
    }

    #[tokio::test]
    async fn insert_assigns_server_columns() {
        let backend = MemoryBackend::new();
        let forged = Uuid::new_v4();

        let row = backend
            .insert("ideas", json!({ "id": forged, "title": "a", "created_at": "1999-01-01T00:00:00Z" }))
            .await
            .unwrap();

        assert_ne!(id_of(&row), forged);
        assert_ne!(row["created_at"], "1999-01-01T00:00:00Z");
        assert_eq!(row["title"], "a");
    }

    #[tokio::test]
    async fn update_merges_and_keeps_id() {
        let backend = MemoryBackend::new();
        let row = backend
            .insert("ideas", json!({ "title": "a", "description": "old" }))
            .await
            .unwrap();
        let id = id_of(&row);

        let updated = backend
            .update("ideas", id, json!({ "description": "new", "id": Uuid::new_v4() }))
            .await
            .unwrap();

        assert_eq!(id_of(&updated), id);
        assert_eq!(updated["title"], "a");
        assert_eq!(updated["description"], "new");
        assert_eq!(updated["created_at"], row["created_at"]);
    }

    #[tokio::test]
    async fn missing_rows_are_not_found() {
        let backend = MemoryBackend::new();
        let id = Uuid::new_v4();

        assert!(backend.select_by_id("ideas", id).await.unwrap_err().is_not_found());
        assert!(backend.update("ideas", id, json!({})).await.unwrap_err().is_not_found());
        assert!(backend.delete("ideas", id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn delete_twice() {
        let backend = MemoryBackend::new();
        let id = id_of(&backend.insert("ideas", json!({ "title": "a" })).await.unwrap());
        backend.insert("ideas", json!({ "title": "b" })).await.unwrap();

        backend.delete("ideas", id).await.unwrap();
        let after_first = backend.select_all("ideas").await.unwrap();

        assert!(backend.delete("ideas", id).await.unwrap_err().is_not_found());
        assert_eq!(backend.select_all("ideas").await.unwrap(), after_first);
        assert_eq!(after_first.len(), 1);
    }

    #[tokio::test]
    async fn non_object_row_is_rejected() {
        let backend = MemoryBackend::new();
        let err = backend.insert("ideas", json!(["title"])).await.unwrap_err();
        assert_eq!(err.status, Some(400));
        assert_eq!(backend.round_trips(), 1);
    }
}
