//! HTTP route handlers

use axum::Router;

use crate::AppState;

pub mod research;

/// Router for all `/api` routes.
pub fn api_router() -> Router<AppState> {
    Router::new().merge(research::router())
}
