use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Admin Router Module
///
/// News management and user oversight. Each handler rejects non-admin callers
/// with 403 after the auth middleware has resolved the caller.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /users
        .route("/users", get(handlers::list_users))
        // POST /news
        // Classifies the content; falls back to "Uncategorized" if the
        // classifier is unavailable.
        .route("/news", post(handlers::create_news))
        // PUT/DELETE /news/{id}
        // Content updates are reclassified and fail with 503 if that is not possible.
        .route(
            "/news/{id}",
            put(handlers::update_news).delete(handlers::delete_news),
        )
}
