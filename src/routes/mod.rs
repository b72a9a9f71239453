use std::sync::Arc;

use axum::{routing::get, Router};

use crate::AppState;

pub mod accounts;
pub mod auth;
pub mod collections;
pub mod health;
pub mod sharing;

/// Routes that carry no rate limiting. `/api/accounts` is nested separately
/// so the signup limiter can wrap it.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/collections", collections::router())
        .nest("/api/sharing", sharing::router())
}
