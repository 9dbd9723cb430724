/// API routes and handlers
pub mod blob;
pub mod health;
pub mod middleware;
pub mod posts;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(health::routes())
        .merge(posts::routes())
        .merge(blob::routes())
}
