//! Values bound to builder queries.

use serde_json::Value;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::Query;

/// A value that can be bound to a PostgreSQL query.
#[derive(Clone, Debug)]
pub enum BindValue {
    BigInt(i64),
    Text(String),
    TextArray(Vec<String>),
    /// Bound as jsonb.
    Json(Value),
}

impl BindValue {
    pub fn bind<'q>(self, query: Query<'q, Postgres, PgArguments>) -> Query<'q, Postgres, PgArguments> {
        match self {
            BindValue::BigInt(n) => query.bind(n),
            BindValue::Text(s) => query.bind(s),
            BindValue::TextArray(v) => query.bind(v),
            BindValue::Json(v) => query.bind(sqlx::types::Json(v)),
        }
    }
}
