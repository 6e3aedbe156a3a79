//! Per-entity data access. Every repository holds its entity name and a store handle;
//! overrides are registered by entity name in [`RepositoryRegistry`].

mod base;
mod registry;
mod related;

pub use base::BaseRepository;
pub use registry::{RepositoryFactory, RepositoryRegistry};
pub use related::{category_repository, product_repository, Relation, RelationKind, RelatedRepository};

use crate::config::EntityName;
use crate::error::StoreError;
use crate::store::Record;
use async_trait::async_trait;

#[async_trait]
pub trait Repository: Send + Sync {
    fn entity(&self) -> &EntityName;

    async fn find_all(&self) -> Result<Vec<Record>, StoreError>;

    /// Equality filter on an arbitrary field. The field name is client input; the store rejects unknown ones.
    async fn find_by_field(&self, field: &str, value: &str) -> Result<Vec<Record>, StoreError>;

    async fn find_by_code(&self, code: &str) -> Result<Option<Record>, StoreError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Record>, StoreError>;

    async fn create(&self, data: Record) -> Result<Record, StoreError>;

    async fn update(&self, id: i64, patch: Record) -> Result<Record, StoreError>;

    async fn delete(&self, id: i64) -> Result<(), StoreError>;

    /// Whether records of this entity carry a `code`.
    fn has_code(&self) -> Result<bool, StoreError>;
}
