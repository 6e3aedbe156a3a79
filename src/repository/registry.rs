//! Entity name -> repository factory. Entities without an override get a `BaseRepository`.

use super::{category_repository, product_repository, BaseRepository, Repository};
use crate::config::EntityName;
use crate::store::Store;
use std::collections::HashMap;
use std::sync::Arc;

pub type RepositoryFactory = fn(EntityName, Arc<dyn Store>) -> Arc<dyn Repository>;

#[derive(Clone)]
pub struct RepositoryRegistry {
    overrides: HashMap<String, RepositoryFactory>,
}

impl RepositoryRegistry {
    /// Registry with no overrides: every entity uses `BaseRepository`.
    pub fn empty() -> Self {
        RepositoryRegistry {
            overrides: HashMap::new(),
        }
    }

    /// Add or replace the override for `entity`.
    pub fn register(mut self, entity: &str, factory: RepositoryFactory) -> Self {
        self.overrides.insert(entity.to_string(), factory);
        self
    }

    pub fn has_override(&self, entity: &EntityName) -> bool {
        self.overrides.contains_key(entity.as_str())
    }

    pub fn build(&self, entity: &EntityName, store: Arc<dyn Store>) -> Arc<dyn Repository> {
        match self.overrides.get(entity.as_str()) {
            Some(factory) => factory(entity.clone(), store),
            None => Arc::new(BaseRepository::new(entity.clone(), store)),
        }
    }
}

impl Default for RepositoryRegistry {
    fn default() -> Self {
        RepositoryRegistry::empty()
            .register("product", product_repository)
            .register("category", category_repository)
    }
}
