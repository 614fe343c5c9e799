/// Router Module Index
///
/// Routes are split by the access level they require. Paths may appear in more
/// than one module with different methods (e.g. `GET /news` is public while
/// `POST /news` is admin-only); axum merges them per method.

/// Routes accessible to anonymous clients.
pub mod public;

/// Routes behind the `AuthUser` middleware layer.
pub mod authenticated;

/// Routes restricted to the 'admin' role. Authentication is enforced by the
/// middleware layer, the role check inside each handler.
pub mod admin;
