//! State shared by the common routes. Built once at startup.

use crate::config::EntityName;
use crate::store::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    /// Mounted entities, reported by `/info`.
    pub entities: Arc<Vec<EntityName>>,
}
