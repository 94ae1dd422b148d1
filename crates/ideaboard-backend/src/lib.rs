pub mod error;
pub mod memory;
pub mod postgrest;

use std::future::Future;

use serde_json::Value;
use uuid::Uuid;

pub use error::BackendError;
pub use memory::MemoryBackend;
pub use postgrest::{BackendConfig, PostgrestClient};

/// Table-scoped access to the hosted data service.
///
/// Rows travel as JSON objects; typing happens one layer up. Every call is a
/// single round trip with no retry, and any failure reported by the service
/// comes back as a [`BackendError`].
pub trait Backend: Send + Sync + 'static {
    fn select_all(&self, table: &str)
    -> impl Future<Output = Result<Vec<Value>, BackendError>> + Send;

    /// Exactly one row. Zero or several matches is an error.
    fn select_by_id(
        &self,
        table: &str,
        id: Uuid,
    ) -> impl Future<Output = Result<Value, BackendError>> + Send;

    /// Returns the stored row, including the backend-assigned `id` and `created_at`.
    fn insert(
        &self,
        table: &str,
        row: Value,
    ) -> impl Future<Output = Result<Value, BackendError>> + Send;

    /// Applies `changes` to the row with `id` and returns it. No match is an error.
    fn update(
        &self,
        table: &str,
        id: Uuid,
        changes: Value,
    ) -> impl Future<Output = Result<Value, BackendError>> + Send;

    /// No match is an error.
    fn delete(&self, table: &str, id: Uuid)
    -> impl Future<Output = Result<(), BackendError>> + Send;
}
