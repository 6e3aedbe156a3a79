//! Router factory: one repository, controller and route table per configured entity.

use crate::config::{validate, AppConfig};
use crate::controller::{CodeGenerator, EntityController};
use crate::error::ConfigError;
use crate::repository::RepositoryRegistry;
use crate::routes::{common_routes, entity_routes};
use crate::state::AppState;
use crate::store::{MemoryStore, Store};
use axum::Router;
use std::sync::Arc;

/// Mounts every entity at `{prefix}/{entity}` and the common routes at the root.
/// The router is immutable once built. Configs that would produce clashing routes are rejected.
pub fn build_router(
    config: &AppConfig,
    store: Arc<dyn Store>,
    registry: &RepositoryRegistry,
) -> Result<Router, ConfigError> {
    validate(config)?;
    let codes = CodeGenerator::new(config.codes.clone());
    let mut api = Router::new();
    for entity in &config.entities {
        let repository = registry.build(entity, store.clone());
        let controller = Arc::new(EntityController::new(repository, codes.clone()));
        api = api.nest(&format!("/{}", entity), entity_routes(controller));
        tracing::info!(
            entity = %entity,
            path = %format!("{}/{}", config.api_path_prefix.as_deref().unwrap_or(""), entity),
            relations = registry.has_override(entity),
            "entity mounted"
        );
    }

    let api = match config.api_path_prefix.as_deref() {
        Some(prefix) => Router::new().nest(prefix, api),
        None => api,
    };

    let state = AppState {
        store,
        entities: Arc::new(config.entities.clone()),
    };
    Ok(api.merge(common_routes(state)))
}

/// In-memory store with a table per configured entity. Every entity needs a field list.
pub fn memory_store(config: &AppConfig) -> Result<MemoryStore, ConfigError> {
    config.entities.iter().try_fold(MemoryStore::new(), |store, entity| {
        let fields = config.fields_for(entity).ok_or_else(|| {
            ConfigError::Load(format!(
                "no field list for entity '{}'; declare it under \"fields\" in ENTITIES_CONFIG",
                entity
            ))
        })?;
        Ok(store.with_entity(entity.as_str(), fields.iter().cloned()))
    })
}
