use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Unauthenticated endpoints: health, login/registration, account creation and
/// the public news listing.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /auth/login
        .route("/auth/login", post(handlers::login))
        // POST /auth/register
        // Creates an account and returns an access token.
        .route("/auth/register", post(handlers::register))
        // POST /users
        // Full profile creation with role-specific fields.
        .route("/users", post(handlers::create_user))
        // GET /news?category=...&search=...&page=...&limit=...
        // Active articles only; each listed article gets a view.
        .route("/news", get(handlers::list_news))
}
