//! Route table for one entity, mounted by the router factory at `/{entity}`.
//! `/:token` and `/:field/:value` differ in segment count, so neither shadows the other.

use crate::controller::EntityController;
use crate::handlers::entity::{create, delete as delete_handler, get_by_token, list_all, list_by_field, update};
use axum::{routing::get, Router};
use std::sync::Arc;

pub fn entity_routes(controller: Arc<EntityController>) -> Router {
    Router::new()
        .route("/", get(list_all).post(create))
        .route(
            "/:token",
            get(get_by_token).put(update).patch(update).delete(delete_handler),
        )
        .route("/:field/:value", get(list_by_field))
        .with_state(controller)
}
