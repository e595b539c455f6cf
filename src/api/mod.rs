/// API routes and handlers
pub mod admin;
pub mod analytics;
pub mod auth;
pub mod comments;
pub mod health;
pub mod media;
pub mod middleware;
pub mod tools;
pub mod upload;
pub mod users;

use crate::context::AppContext;
use axum::Router;

/// Build the JSON API, mounted under `/api`
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(auth::routes())
        .merge(users::routes())
        .merge(tools::routes())
        .merge(comments::routes())
        .merge(media::routes())
        .merge(analytics::routes())
        .merge(admin::routes())
}
