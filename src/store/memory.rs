//! In-memory persistence engine with the same error semantics as `PgStore`.

use super::{join_key, Record, Store, UniqueKey, CODE_FIELD, ID_FIELD};
use crate::error::StoreError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

struct Table {
    fields: HashSet<String>,
    next_id: i64,
    rows: BTreeMap<i64, Record>,
}

impl Table {
    fn check_fields(&self, entity: &str, record: &Record) -> Result<(), StoreError> {
        for field in record.keys() {
            if field != ID_FIELD && !self.fields.contains(field) {
                return Err(StoreError::UnknownField {
                    entity: entity.to_string(),
                    field: field.clone(),
                });
            }
        }
        Ok(())
    }

    fn check_field(&self, entity: &str, field: &str) -> Result<(), StoreError> {
        if field == ID_FIELD || self.fields.contains(field) {
            Ok(())
        } else {
            Err(StoreError::UnknownField {
                entity: entity.to_string(),
                field: field.to_string(),
            })
        }
    }

    /// Unique `code` across the table, ignoring row `except`.
    fn check_code(&self, entity: &str, record: &Record, except: Option<i64>) -> Result<(), StoreError> {
        let Some(code) = record.get(CODE_FIELD).filter(|v| !v.is_null()) else {
            return Ok(());
        };
        let taken = self
            .rows
            .iter()
            .any(|(id, row)| Some(*id) != except && row.get(CODE_FIELD) == Some(code));
        if taken {
            return Err(StoreError::Constraint(format!(
                "unique constraint on {}.{}",
                entity, CODE_FIELD
            )));
        }
        Ok(())
    }
}

/// Tables are declared up front with their field names; `id` is implicit.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity<I, S>(self, entity: &str, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let table = Table {
            fields: fields.into_iter().map(Into::into).collect(),
            next_id: 1,
            rows: BTreeMap::new(),
        };
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entity.to_string(), table);
        self
    }

    fn read<T>(
        &self,
        entity: &str,
        f: impl FnOnce(&Table) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let table = tables
            .get(entity)
            .ok_or_else(|| StoreError::UnknownEntity(entity.to_string()))?;
        f(table)
    }

    fn write<T>(
        &self,
        entity: &str,
        f: impl FnOnce(&mut Table) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let table = tables
            .get_mut(entity)
            .ok_or_else(|| StoreError::UnknownEntity(entity.to_string()))?;
        f(table)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_many(
        &self,
        entity: &str,
        filter: Option<(&str, &str)>,
    ) -> Result<Vec<Record>, StoreError> {
        self.read(entity, |table| {
            if let Some((field, _)) = filter {
                table.check_field(entity, field)?;
            }
            Ok(table
                .rows
                .values()
                .filter(|row| match filter {
                    Some((field, value)) => {
                        row.get(field).and_then(join_key).as_deref() == Some(value)
                    }
                    None => true,
                })
                .cloned()
                .collect())
        })
    }

    async fn find_where_in(
        &self,
        entity: &str,
        field: &str,
        values: &[Value],
    ) -> Result<Vec<Record>, StoreError> {
        let wanted: HashSet<String> = values.iter().filter_map(join_key).collect();
        self.read(entity, |table| {
            table.check_field(entity, field)?;
            Ok(table
                .rows
                .values()
                .filter(|row| {
                    row.get(field)
                        .and_then(join_key)
                        .map(|k| wanted.contains(&k))
                        .unwrap_or(false)
                })
                .cloned()
                .collect())
        })
    }

    async fn find_unique(&self, entity: &str, key: UniqueKey<'_>) -> Result<Option<Record>, StoreError> {
        self.read(entity, |table| match key {
            UniqueKey::Id(id) => Ok(table.rows.get(&id).cloned()),
            UniqueKey::Code(_) if !table.fields.contains(CODE_FIELD) => Ok(None),
            UniqueKey::Code(code) => {
                Ok(table
                    .rows
                    .values()
                    .find(|row| row.get(CODE_FIELD).and_then(Value::as_str) == Some(code))
                    .cloned())
            }
        })
    }

    async fn insert(&self, entity: &str, data: &Record) -> Result<Record, StoreError> {
        self.write(entity, |table| {
            if data.contains_key(ID_FIELD) {
                return Err(StoreError::InvalidRecord("id is assigned by the store".into()));
            }
            table.check_fields(entity, data)?;
            table.check_code(entity, data, None)?;
            let id = table.next_id;
            table.next_id += 1;
            let mut row = Record::new();
            row.insert(ID_FIELD.to_string(), Value::from(id));
            row.extend(data.iter().map(|(k, v)| (k.clone(), v.clone())));
            table.rows.insert(id, row.clone());
            Ok(row)
        })
    }

    async fn update(&self, entity: &str, id: i64, patch: &Record) -> Result<Record, StoreError> {
        self.write(entity, |table| {
            table.check_fields(entity, patch)?;
            if !table.rows.contains_key(&id) {
                return Err(StoreError::NotFound {
                    entity: entity.to_string(),
                    id,
                });
            }
            table.check_code(entity, patch, Some(id))?;
            let row = table.rows.get_mut(&id).ok_or_else(|| StoreError::NotFound {
                entity: entity.to_string(),
                id,
            })?;
            for (k, v) in patch {
                if k != ID_FIELD {
                    row.insert(k.clone(), v.clone());
                }
            }
            Ok(row.clone())
        })
    }

    async fn delete(&self, entity: &str, id: i64) -> Result<(), StoreError> {
        self.write(entity, |table| match table.rows.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound {
                entity: entity.to_string(),
                id,
            }),
        })
    }

    fn has_field(&self, entity: &str, field: &str) -> Result<bool, StoreError> {
        self.read(entity, |table| Ok(field == ID_FIELD || table.fields.contains(field)))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
