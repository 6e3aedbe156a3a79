//! Entity CRUD handlers. One controller per mounted entity is carried as router state.

use crate::controller::EntityController;
use crate::error::AppError;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::Value;
use std::sync::Arc;

pub type EntityState = State<Arc<EntityController>>;

/// Blank or missing bodies are a validation error whatever the content type.
fn parse_body(body: &Bytes) -> Result<Value, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(AppError::Validation("request body is empty".into()));
    }
    serde_json::from_slice(body).map_err(|e| AppError::Validation(format!("invalid JSON body: {}", e)))
}

pub async fn list_all(State(controller): EntityState) -> Result<impl IntoResponse, AppError> {
    Ok(Json(controller.list_all().await?))
}

pub async fn get_by_token(
    State(controller): EntityState,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(controller.get_by_token(&token).await?))
}

pub async fn list_by_field(
    State(controller): EntityState,
    Path((field, value)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(controller.list_by_field(&field, &value).await?))
}

pub async fn create(State(controller): EntityState, body: Bytes) -> Result<impl IntoResponse, AppError> {
    let body = parse_body(&body)?;
    Ok((StatusCode::OK, Json(controller.create(body).await?)))
}

/// Serves both `PUT` and `PATCH`.
pub async fn update(
    State(controller): EntityState,
    Path(token): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let body = parse_body(&body)?;
    Ok(Json(controller.update(&token, body).await?))
}

pub async fn delete(
    State(controller): EntityState,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    controller.delete(&token).await?;
    Ok(StatusCode::NO_CONTENT)
}
