//! PostgreSQL persistence engine. Column sets are loaded once from information_schema
//! and are the only source of identifiers that reach SQL text.

use super::{Record, Store, UniqueKey, CODE_FIELD, ID_FIELD};
use crate::config::EntityName;
use crate::error::StoreError;
use crate::sql::{self, QueryBuf, TableRef};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{ConnectOptions, PgPool, Row};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;

pub struct PgStore {
    pool: PgPool,
    schema: String,
    columns: HashMap<String, HashSet<String>>,
}

impl PgStore {
    /// Load the column set of every entity table in `schema`. Missing tables are logged and
    /// reported as `UnknownEntity` when first used.
    pub async fn connect(pool: PgPool, schema: &str, entities: &[EntityName]) -> Result<Self, StoreError> {
        let names: Vec<String> = entities.iter().map(|e| e.to_string()).collect();
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT table_name::text, column_name::text FROM information_schema.columns \
             WHERE table_schema = $1 AND table_name::text = ANY($2) \
             ORDER BY table_name, ordinal_position",
        )
        .bind(schema)
        .bind(&names)
        .fetch_all(&pool)
        .await?;

        let mut columns: HashMap<String, HashSet<String>> = HashMap::new();
        for (table, column) in rows {
            columns.entry(table).or_default().insert(column);
        }
        for name in &names {
            match columns.get(name) {
                Some(cols) if cols.contains(ID_FIELD) => {
                    tracing::debug!(entity = %name, columns = cols.len(), "loaded table columns");
                }
                Some(_) => tracing::warn!(entity = %name, "table has no id column"),
                None => tracing::warn!(entity = %name, schema, "no table found for entity"),
            }
        }
        Ok(PgStore {
            pool,
            schema: schema.to_string(),
            columns,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn table<'a>(&'a self, entity: &'a str) -> Result<(TableRef<'a>, &'a HashSet<String>), StoreError> {
        let cols = self
            .columns
            .get(entity)
            .ok_or_else(|| StoreError::UnknownEntity(entity.to_string()))?;
        Ok((
            TableRef {
                schema: &self.schema,
                table: entity,
            },
            cols,
        ))
    }

    fn check_field(entity: &str, cols: &HashSet<String>, field: &str) -> Result<(), StoreError> {
        if cols.contains(field) {
            Ok(())
        } else {
            Err(StoreError::UnknownField {
                entity: entity.to_string(),
                field: field.to_string(),
            })
        }
    }

    /// Columns written from `record`; `id` is never written.
    fn writable_columns<'r>(
        entity: &str,
        cols: &HashSet<String>,
        record: &'r Record,
    ) -> Result<Vec<&'r str>, StoreError> {
        let mut out = Vec::with_capacity(record.len());
        for field in record.keys() {
            if field == ID_FIELD {
                continue;
            }
            Self::check_field(entity, cols, field)?;
            out.push(field.as_str());
        }
        Ok(out)
    }

    async fn fetch_all(&self, q: QueryBuf) -> Result<Vec<Record>, StoreError> {
        let QueryBuf { sql, params } = q;
        tracing::debug!(sql = %sql, params = ?params, "query");
        let mut query = sqlx::query(&sql);
        for p in params {
            query = p.bind(query);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(map_db_error)?;
        rows.iter().map(row_to_record).collect()
    }

    async fn fetch_optional(&self, q: QueryBuf) -> Result<Option<Record>, StoreError> {
        let QueryBuf { sql, params } = q;
        tracing::debug!(sql = %sql, params = ?params, "query");
        let mut query = sqlx::query(&sql);
        for p in params {
            query = p.bind(query);
        }
        let row = query.fetch_optional(&self.pool).await.map_err(map_db_error)?;
        row.as_ref().map(row_to_record).transpose()
    }
}

fn row_to_record(row: &sqlx::postgres::PgRow) -> Result<Record, StoreError> {
    let value: Value = row.try_get("record")?;
    match value {
        Value::Object(m) => Ok(m),
        other => Err(StoreError::InvalidRecord(format!("expected object row, got {}", other))),
    }
}

fn map_db_error(e: sqlx::Error) -> StoreError {
    let constraint = e
        .as_database_error()
        .and_then(|db| db.code())
        .map(|code| code == "23505" || code == "23503")
        .unwrap_or(false);
    if constraint {
        let message = e
            .as_database_error()
            .map(|db| db.message().to_string())
            .unwrap_or_default();
        return StoreError::Constraint(message);
    }
    StoreError::Db(e)
}

#[async_trait]
impl Store for PgStore {
    async fn find_many(
        &self,
        entity: &str,
        filter: Option<(&str, &str)>,
    ) -> Result<Vec<Record>, StoreError> {
        let (table, cols) = self.table(entity)?;
        let q = match filter {
            Some((field, value)) => {
                Self::check_field(entity, cols, field)?;
                sql::select_where_text(&table, field, value)
            }
            None => sql::select_all(&table),
        };
        self.fetch_all(q).await
    }

    async fn find_where_in(
        &self,
        entity: &str,
        field: &str,
        values: &[Value],
    ) -> Result<Vec<Record>, StoreError> {
        let (table, cols) = self.table(entity)?;
        Self::check_field(entity, cols, field)?;
        let keys: Vec<String> = values.iter().filter_map(super::join_key).collect();
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        self.fetch_all(sql::select_where_in(&table, field, keys)).await
    }

    async fn find_unique(&self, entity: &str, key: UniqueKey<'_>) -> Result<Option<Record>, StoreError> {
        let (table, cols) = self.table(entity)?;
        let q = match key {
            UniqueKey::Id(id) => sql::select_by_id(&table, id),
            UniqueKey::Code(_) if !cols.contains(CODE_FIELD) => return Ok(None),
            UniqueKey::Code(code) => sql::select_by_code(&table, CODE_FIELD, code),
        };
        self.fetch_optional(q).await
    }

    async fn insert(&self, entity: &str, data: &Record) -> Result<Record, StoreError> {
        let (table, cols) = self.table(entity)?;
        if data.contains_key(ID_FIELD) {
            return Err(StoreError::InvalidRecord("id is assigned by the store".into()));
        }
        let columns = Self::writable_columns(entity, cols, data)?;
        let q = sql::insert(&table, &columns, Value::Object(data.clone()));
        self.fetch_optional(q)
            .await?
            .ok_or_else(|| StoreError::InvalidRecord("insert returned no row".into()))
    }

    async fn update(&self, entity: &str, id: i64, patch: &Record) -> Result<Record, StoreError> {
        let (table, cols) = self.table(entity)?;
        let columns = Self::writable_columns(entity, cols, patch)?;
        let q = sql::update(&table, id, &columns, Value::Object(patch.clone()));
        self.fetch_optional(q).await?.ok_or_else(|| StoreError::NotFound {
            entity: entity.to_string(),
            id,
        })
    }

    async fn delete(&self, entity: &str, id: i64) -> Result<(), StoreError> {
        let (table, _) = self.table(entity)?;
        let QueryBuf { sql, params } = sql::delete(&table, id);
        tracing::debug!(sql = %sql, params = ?params, "query");
        let mut query = sqlx::query(&sql);
        for p in params {
            query = p.bind(query);
        }
        match query.fetch_optional(&self.pool).await.map_err(map_db_error)? {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound {
                entity: entity.to_string(),
                id,
            }),
        }
    }

    fn has_field(&self, entity: &str, field: &str) -> Result<bool, StoreError> {
        let (_, cols) = self.table(entity)?;
        Ok(cols.contains(field))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }
}

/// Create the target database if it does not exist (connects to the `postgres` maintenance database).
pub async fn ensure_database_exists(database_url: &str) -> Result<(), StoreError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", quote_ident(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

/// Apply sqlx migrations found in `dir`.
pub async fn run_migrations(pool: &PgPool, dir: &Path) -> Result<(), StoreError> {
    let migrator = sqlx::migrate::Migrator::new(dir).await?;
    migrator.run(pool).await?;
    tracing::info!(dir = %dir.display(), "migrations applied");
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), StoreError> {
    let path_start = url
        .rfind('/')
        .ok_or_else(|| StoreError::Db(sqlx::Error::Configuration("DATABASE_URL: no path".into())))?
        + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    let admin_url = format!("{}postgres", base);
    Ok((admin_url, db_name.to_string()))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
