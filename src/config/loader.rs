//! Load config from environment variables and an optional JSON entities file.

use crate::config::types::*;
use crate::config::{normalize_prefix, parse_entities, validate};
use crate::error::ConfigError;
use std::path::{Path, PathBuf};

const DEFAULT_ENTITIES: &str = "product,category,user";

/// Build config from the process environment (`.env` is loaded by the binary).
pub async fn load_config() -> Result<AppConfig, ConfigError> {
    let file = match std::env::var("ENTITIES_CONFIG") {
        Ok(path) if !path.trim().is_empty() => Some(load_entities_file(Path::new(path.trim())).await?),
        _ => None,
    };
    load_config_from(|key| std::env::var(key).ok(), file)
}

pub async fn load_entities_file(path: &Path) -> Result<EntitiesFile, ConfigError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
}

/// Build config from a variable lookup. Entities from `file` take precedence over `ENTITIES`.
pub fn load_config_from<F>(var: F, file: Option<EntitiesFile>) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let entities = match &file {
        Some(f) => parse_entities(&f.entities)?,
        None => {
            let raw = var("ENTITIES").unwrap_or_else(|| DEFAULT_ENTITIES.into());
            parse_entities(raw.split(','))?
        }
    };

    let mut config = AppConfig::with_entities(entities);

    if let Some(prefix) = var("API_PATH_PREFIX") {
        config.api_path_prefix = normalize_prefix(&prefix);
    }
    if let Some(host) = var("API_HOST").filter(|s| !s.trim().is_empty()) {
        config.host = host;
    }
    if let Some(port) = var("API_PORT") {
        config.port = port.trim().parse().map_err(|_| ConfigError::Env {
            var: "API_PORT",
            message: format!("'{}' is not a port number", port),
        })?;
    }
    if let Some(backend) = var("STORE_BACKEND") {
        config.store_backend = backend.trim().parse()?;
    }
    if let Some(url) = var("DATABASE_URL") {
        config.database_url = url;
    }
    if let Some(schema) = var("DATABASE_SCHEMA").filter(|s| !s.trim().is_empty()) {
        config.database_schema = schema.trim().to_string();
    }
    config.migrations_dir = var("MIGRATIONS_DIR")
        .filter(|s| !s.trim().is_empty())
        .map(|s| PathBuf::from(s.trim()));

    if let Some(f) = file {
        config.entity_fields.extend(f.fields);
        if let Some(codes) = f.code {
            config.codes = codes;
        }
    }
    if let Some(len) = var("CODE_LENGTH") {
        config.codes.length = len.trim().parse().map_err(|_| ConfigError::Env {
            var: "CODE_LENGTH",
            message: format!("'{}' is not a number", len),
        })?;
    }
    if let Some(prefix) = var("CODE_PREFIX") {
        config.codes.prefix = prefix;
    }
    if let Some(suffix) = var("CODE_SUFFIX") {
        config.codes.suffix = suffix;
    }

    validate(&config)?;
    Ok(config)
}
