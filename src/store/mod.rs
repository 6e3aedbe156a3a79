//! Persistence engine port. Repositories receive an `Arc<dyn Store>` at construction.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{ensure_database_exists, run_migrations, PgStore};

use crate::error::StoreError;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// One persisted row as a JSON object. Always carries a numeric `id`.
pub type Record = Map<String, Value>;

pub const ID_FIELD: &str = "id";
pub const CODE_FIELD: &str = "code";

/// Lookup on one of the two unique keys every entity has.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniqueKey<'a> {
    Id(i64),
    Code(&'a str),
}

#[async_trait]
pub trait Store: Send + Sync {
    /// All rows of `entity` ordered by id; with a filter, only rows whose field's textual form equals the value.
    async fn find_many(
        &self,
        entity: &str,
        filter: Option<(&str, &str)>,
    ) -> Result<Vec<Record>, StoreError>;

    /// Rows where `field` matches any of `values`. Used for batch-loading related rows.
    async fn find_where_in(
        &self,
        entity: &str,
        field: &str,
        values: &[Value],
    ) -> Result<Vec<Record>, StoreError>;

    /// Exactly-one-or-none lookup. A code lookup on an entity without a `code` column finds nothing.
    async fn find_unique(&self, entity: &str, key: UniqueKey<'_>) -> Result<Option<Record>, StoreError>;

    /// Insert a row without `id`; the store assigns it.
    async fn insert(&self, entity: &str, data: &Record) -> Result<Record, StoreError>;

    async fn update(&self, entity: &str, id: i64, patch: &Record) -> Result<Record, StoreError>;

    async fn delete(&self, entity: &str, id: i64) -> Result<(), StoreError>;

    /// Whether `entity` has a column named `field`. Entities without a `code` column get no generated code.
    fn has_field(&self, entity: &str, field: &str) -> Result<bool, StoreError>;

    /// Cheap liveness probe for readiness checks.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Textual form used for equality filters and joins: numbers and strings compare by their text.
pub fn join_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

pub fn record_id(record: &Record) -> Option<i64> {
    record.get(ID_FIELD).and_then(Value::as_i64)
}
