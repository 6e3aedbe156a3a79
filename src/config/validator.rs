//! Config validation: entity names, uniqueness, prefix normalization.

use crate::config::{AppConfig, CodeSettings, EntityName};
use crate::error::ConfigError;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn entity_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static pattern"))
}

pub fn validate_entity_name(name: &str) -> Result<EntityName, ConfigError> {
    if !entity_name_pattern().is_match(name) {
        return Err(ConfigError::InvalidEntityName(name.to_string()));
    }
    Ok(EntityName::new_unchecked(name))
}

/// Parse an ordered entity list; blank items are skipped, duplicates rejected.
pub fn parse_entities<I, S>(names: I) -> Result<Vec<EntityName>, ConfigError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for raw in names {
        let name = raw.as_ref().trim();
        if name.is_empty() {
            continue;
        }
        let entity = validate_entity_name(name)?;
        if !seen.insert(name.to_string()) {
            return Err(ConfigError::DuplicateEntity(name.to_string()));
        }
        out.push(entity);
    }
    if out.is_empty() {
        return Err(ConfigError::NoEntities);
    }
    Ok(out)
}

/// "api", "/api/", "//api" all become "/api". Empty and "/" mean no prefix.
pub fn normalize_prefix(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(format!("/{}", trimmed))
    }
}

/// Paths served by the common routes. Entities mounted at the root cannot use them.
pub const RESERVED_ROOT_NAMES: [&str; 4] = ["health", "ready", "version", "info"];

/// Codes are addressed as a single path segment, so no part of one may contain '/'.
pub fn validate_codes(codes: &CodeSettings) -> Result<(), ConfigError> {
    if codes.length == 0 || codes.length > 64 {
        return Err(ConfigError::InvalidCodeLength(codes.length));
    }
    if codes.prefix.contains('/') {
        return Err(ConfigError::InvalidCodeAffix("prefix"));
    }
    if codes.suffix.contains('/') {
        return Err(ConfigError::InvalidCodeAffix("suffix"));
    }
    Ok(())
}

pub fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    if config.entities.is_empty() {
        return Err(ConfigError::NoEntities);
    }
    let mut seen = HashSet::new();
    for entity in &config.entities {
        validate_entity_name(entity.as_str())?;
        if !seen.insert(entity.as_str()) {
            return Err(ConfigError::DuplicateEntity(entity.to_string()));
        }
        if config.api_path_prefix.is_none() && RESERVED_ROOT_NAMES.contains(&entity.as_str()) {
            return Err(ConfigError::ReservedEntityName(entity.to_string()));
        }
    }
    validate_codes(&config.codes)
}
