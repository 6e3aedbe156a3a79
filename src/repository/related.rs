//! Repositories whose list operation expands related records.

use super::{BaseRepository, Repository};
use crate::config::EntityName;
use crate::error::StoreError;
use crate::store::{join_key, Record, Store, ID_FIELD};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Direction of a relation: to_one (we hold the FK) or to_many (they hold the FK to us).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelationKind {
    ToOne,
    ToMany,
}

#[derive(Clone, Debug)]
pub struct Relation {
    /// Key the related record (to_one) or array (to_many) is attached under.
    pub name: String,
    pub kind: RelationKind,
    /// Entity the related rows belong to.
    pub related: String,
    /// Our column used in the join (our FK for to_one; our id for to_many).
    pub our_key: String,
    /// Their column used in the join (their id for to_one; their FK for to_many).
    pub their_key: String,
}

impl Relation {
    pub fn to_one(name: &str, related: &str, our_key: &str) -> Self {
        Relation {
            name: name.to_string(),
            kind: RelationKind::ToOne,
            related: related.to_string(),
            our_key: our_key.to_string(),
            their_key: ID_FIELD.to_string(),
        }
    }

    pub fn to_many(name: &str, related: &str, their_key: &str) -> Self {
        Relation {
            name: name.to_string(),
            kind: RelationKind::ToMany,
            related: related.to_string(),
            our_key: ID_FIELD.to_string(),
            their_key: their_key.to_string(),
        }
    }
}

/// Default repository plus relation expansion on `find_all`. Related rows are batch-loaded,
/// one store call per relation.
pub struct RelatedRepository {
    base: BaseRepository,
    relations: Vec<Relation>,
}

impl RelatedRepository {
    pub fn new(base: BaseRepository, relations: Vec<Relation>) -> Self {
        RelatedRepository { base, relations }
    }

    /// Attach the empty value for `relation` to every row.
    fn attach_empty(rows: &mut [Record], relation: &Relation) {
        let empty = match relation.kind {
            RelationKind::ToOne => Value::Null,
            RelationKind::ToMany => Value::Array(Vec::new()),
        };
        for row in rows.iter_mut() {
            row.insert(relation.name.clone(), empty.clone());
        }
    }

    async fn expand(&self, rows: &mut [Record], relation: &Relation) -> Result<(), StoreError> {
        // Related entity not mounted in this deployment: nothing to join against.
        if let Err(StoreError::UnknownEntity(_)) =
            self.base.store().has_field(&relation.related, &relation.their_key)
        {
            tracing::debug!(
                entity = %self.base.entity(),
                relation = %relation.name,
                related = %relation.related,
                "related entity not configured"
            );
            Self::attach_empty(rows, relation);
            return Ok(());
        }

        let mut seen = HashSet::new();
        let keys: Vec<Value> = rows
            .iter()
            .filter_map(|row| row.get(&relation.our_key))
            .filter(|v| join_key(v).map(|k| seen.insert(k)).unwrap_or(false))
            .cloned()
            .collect();
        let related = self
            .base
            .store()
            .find_where_in(&relation.related, &relation.their_key, &keys)
            .await?;
        tracing::debug!(
            entity = %self.base.entity(),
            relation = %relation.name,
            related = related.len(),
            "expanded relation"
        );

        match relation.kind {
            RelationKind::ToOne => {
                let by_key: HashMap<String, Record> = related
                    .into_iter()
                    .filter_map(|r| {
                        let k = join_key(r.get(&relation.their_key)?)?;
                        Some((k, r))
                    })
                    .collect();
                for row in rows.iter_mut() {
                    let value = row
                        .get(&relation.our_key)
                        .and_then(join_key)
                        .and_then(|k| by_key.get(&k))
                        .cloned()
                        .map(Value::Object)
                        .unwrap_or(Value::Null);
                    row.insert(relation.name.clone(), value);
                }
            }
            RelationKind::ToMany => {
                let mut grouped: HashMap<String, Vec<Value>> = HashMap::new();
                for r in related {
                    if let Some(k) = r.get(&relation.their_key).and_then(join_key) {
                        grouped.entry(k).or_default().push(Value::Object(r));
                    }
                }
                for row in rows.iter_mut() {
                    let items = row
                        .get(&relation.our_key)
                        .and_then(join_key)
                        .and_then(|k| grouped.get(&k))
                        .cloned()
                        .unwrap_or_default();
                    row.insert(relation.name.clone(), Value::Array(items));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for RelatedRepository {
    fn entity(&self) -> &EntityName {
        self.base.entity()
    }

    async fn find_all(&self) -> Result<Vec<Record>, StoreError> {
        let mut rows = self.base.find_all().await?;
        for relation in &self.relations {
            self.expand(&mut rows, relation).await?;
        }
        Ok(rows)
    }

    async fn find_by_field(&self, field: &str, value: &str) -> Result<Vec<Record>, StoreError> {
        self.base.find_by_field(field, value).await
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Record>, StoreError> {
        self.base.find_by_code(code).await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Record>, StoreError> {
        self.base.find_by_id(id).await
    }

    async fn create(&self, data: Record) -> Result<Record, StoreError> {
        self.base.create(data).await
    }

    async fn update(&self, id: i64, patch: Record) -> Result<Record, StoreError> {
        self.base.update(id, patch).await
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.base.delete(id).await
    }

    fn has_code(&self) -> Result<bool, StoreError> {
        self.base.has_code()
    }
}

/// Products are listed with their category.
pub fn product_repository(entity: EntityName, store: Arc<dyn Store>) -> Arc<dyn Repository> {
    Arc::new(RelatedRepository::new(
        BaseRepository::new(entity, store),
        vec![Relation::to_one("category", "category", "categoryId")],
    ))
}

/// Categories are listed with their products.
pub fn category_repository(entity: EntityName, store: Arc<dyn Store>) -> Arc<dyn Repository> {
    Arc::new(RelatedRepository::new(
        BaseRepository::new(entity, store),
        vec![Relation::to_many("products", "product", "categoryId")],
    ))
}
