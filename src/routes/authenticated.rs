use crate::{AppState, handlers::users};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Routes for any signed-in user. Must be wrapped in `auth_middleware`.
pub fn authenticated_routes() -> Router<AppState> {
    Router::new()
        // GET/PATCH /api/v1/users/me/
        // The caller's own profile. PATCH cannot change the caller's role.
        .route("/users/me/", get(users::get_me).patch(users::update_me))
}
