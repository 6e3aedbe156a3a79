//! Runtime configuration: managed entities, API prefix, storage backend, code generation.

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// Name of a managed resource kind. Also the table name and the URL segment.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EntityName(String);

impl EntityName {
    /// Wraps a name that has already passed [`crate::config::validate_entity_name`].
    pub(crate) fn new_unchecked(name: impl Into<String>) -> Self {
        EntityName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EntityName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = crate::error::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(crate::error::ConfigError::Env {
                var: "STORE_BACKEND",
                message: format!("expected postgres or memory, got '{}'", other),
            }),
        }
    }
}

/// Shape of generated record codes.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct CodeSettings {
    #[serde(default = "default_code_length")]
    pub length: usize,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
}

fn default_code_length() -> usize {
    5
}

impl Default for CodeSettings {
    fn default() -> Self {
        CodeSettings {
            length: default_code_length(),
            prefix: String::new(),
            suffix: String::new(),
        }
    }
}

/// JSON file referenced by `ENTITIES_CONFIG`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct EntitiesFile {
    pub entities: Vec<String>,
    /// Field lists per entity, only consulted by the memory backend.
    #[serde(default)]
    pub fields: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub code: Option<CodeSettings>,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub entities: Vec<EntityName>,
    /// Normalized: starts with '/', no trailing '/'. None mounts entities at the root.
    pub api_path_prefix: Option<String>,
    pub host: String,
    pub port: u16,
    pub store_backend: StoreBackend,
    pub database_url: String,
    pub database_schema: String,
    pub migrations_dir: Option<PathBuf>,
    pub entity_fields: HashMap<String, Vec<String>>,
    pub codes: CodeSettings,
}

impl AppConfig {
    /// Config for the given entities with every other setting at its default.
    pub fn with_entities(entities: Vec<EntityName>) -> Self {
        AppConfig {
            entities,
            api_path_prefix: Some("/api".into()),
            host: "0.0.0.0".into(),
            port: 3001,
            store_backend: StoreBackend::Postgres,
            database_url: "postgres://localhost/crud_forge".into(),
            database_schema: "public".into(),
            migrations_dir: None,
            entity_fields: default_entity_fields(),
            codes: CodeSettings::default(),
        }
    }

    pub fn fields_for(&self, entity: &EntityName) -> Option<&[String]> {
        self.entity_fields.get(entity.as_str()).map(Vec::as_slice)
    }
}

/// Built-in field lists for the memory backend.
pub fn default_entity_fields() -> HashMap<String, Vec<String>> {
    let mut m = HashMap::new();
    m.insert(
        "product".to_string(),
        vec!["name", "price", "code", "categoryId"].into_iter().map(String::from).collect(),
    );
    m.insert(
        "category".to_string(),
        vec!["name", "code"].into_iter().map(String::from).collect(),
    );
    m.insert(
        "user".to_string(),
        vec!["name", "email", "code"].into_iter().map(String::from).collect(),
    );
    m
}
