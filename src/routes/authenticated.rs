use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Endpoints available to any signed-in user, student or admin. The router
/// assembled in `create_router` wraps this module in the auth middleware, so
/// every handler here receives a validated `AuthUser`.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /auth/me
        .route("/auth/me", get(handlers::get_me))
        // GET/PUT /users/me/preferences
        // Preferred categories drive the recommendation feed.
        .route(
            "/users/me/preferences",
            get(handlers::get_preferences).put(handlers::update_preferences),
        )
        // GET /users/me/department
        .route("/users/me/department", get(handlers::get_department))
        // POST /news/classify
        // Ad-hoc classification, nothing is stored.
        .route("/news/classify", post(handlers::classify_text))
        // GET /news/recommended
        // Static segment, matched ahead of /news/{id}.
        .route("/news/recommended", get(handlers::get_recommended_news))
        // GET /news/{id}
        .route("/news/{id}", get(handlers::get_news))
        // POST /news/{id}/like
        .route("/news/{id}/like", post(handlers::like_news))
}
