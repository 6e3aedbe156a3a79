//! Default repository: every operation maps straight onto the store.

use super::Repository;
use crate::config::EntityName;
use crate::error::StoreError;
use crate::store::{Record, Store, UniqueKey, CODE_FIELD};
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Clone)]
pub struct BaseRepository {
    entity: EntityName,
    store: Arc<dyn Store>,
}

impl BaseRepository {
    pub fn new(entity: EntityName, store: Arc<dyn Store>) -> Self {
        BaseRepository { entity, store }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }
}

#[async_trait]
impl Repository for BaseRepository {
    fn entity(&self) -> &EntityName {
        &self.entity
    }

    async fn find_all(&self) -> Result<Vec<Record>, StoreError> {
        self.store.find_many(self.entity.as_str(), None).await
    }

    async fn find_by_field(&self, field: &str, value: &str) -> Result<Vec<Record>, StoreError> {
        self.store
            .find_many(self.entity.as_str(), Some((field, value)))
            .await
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Record>, StoreError> {
        self.store
            .find_unique(self.entity.as_str(), UniqueKey::Code(code))
            .await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Record>, StoreError> {
        self.store
            .find_unique(self.entity.as_str(), UniqueKey::Id(id))
            .await
    }

    async fn create(&self, data: Record) -> Result<Record, StoreError> {
        self.store.insert(self.entity.as_str(), &data).await
    }

    async fn update(&self, id: i64, patch: Record) -> Result<Record, StoreError> {
        self.store.update(self.entity.as_str(), id, &patch).await
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.store.delete(self.entity.as_str(), id).await
    }

    fn has_code(&self) -> Result<bool, StoreError> {
        self.store.has_field(self.entity.as_str(), CODE_FIELD)
    }
}
