//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no entities configured")]
    NoEntities,
    #[error("invalid entity name: '{0}'")]
    InvalidEntityName(String),
    #[error("duplicate entity: {0}")]
    DuplicateEntity(String),
    #[error("entity name '{0}' collides with a built-in route; set API_PATH_PREFIX")]
    ReservedEntityName(String),
    #[error("code length must be between 1 and 64, got {0}")]
    InvalidCodeLength(usize),
    #[error("code {0} must not contain '/'")]
    InvalidCodeAffix(&'static str),
    #[error("invalid value for {var}: {message}")]
    Env { var: &'static str, message: String },
    #[error("config load: {0}")]
    Load(String),
}

/// Failures raised by a persistence engine and propagated untouched through repositories.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("unknown entity: {0}")]
    UnknownEntity(String),
    #[error("unknown field '{field}' on {entity}")]
    UnknownField { entity: String, field: String },
    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: i64 },
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("migration: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("validation: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("storage failure in {operation} on {entity}: {source}")]
    Storage {
        entity: String,
        operation: &'static str,
        #[source]
        source: StoreError,
    },
}

impl AppError {
    /// Wraps a store failure at the controller boundary. Logs it once with its context.
    pub fn storage(entity: &str, operation: &'static str, source: StoreError) -> Self {
        tracing::error!(entity = %entity, operation, error = %source, "storage failure");
        AppError::Storage {
            entity: entity.to_string(),
            operation,
            source,
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Storage { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
        };
        let message = match &self {
            AppError::Config(_) | AppError::Storage { .. } => "internal server error".to_string(),
            AppError::Validation(m) | AppError::NotFound(m) => m.clone(),
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}
