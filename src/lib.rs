//! crud-forge: generic CRUD REST backend over a configurable list of entities.

pub mod app;
pub mod config;
pub mod controller;
pub mod error;
pub mod handlers;
pub mod repository;
pub mod routes;
pub mod sql;
pub mod state;
pub mod store;

pub use app::{build_router, memory_store};
pub use config::{load_config, AppConfig, EntityName, StoreBackend};
pub use controller::{EntityController, Identifier};
pub use error::{AppError, ConfigError, StoreError};
pub use repository::{Repository, RepositoryRegistry};
pub use routes::{common_routes, entity_routes};
pub use state::AppState;
pub use store::{ensure_database_exists, run_migrations, MemoryStore, PgStore, Record, Store};
