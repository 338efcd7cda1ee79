use crate::{AppState, handlers::users};
use axum::{Router, routing::get};

/// Admin Router Module
///
/// Account management, restricted to admins and superusers.
///
/// Access Control:
/// The router is wrapped in `auth_middleware` (401 for anonymous callers) and
/// every handler checks `permissions::admin_only` (403 for other roles).
/// The static `users/me/` route of the authenticated router takes precedence
/// over `users/{username}/`, so "me" is never looked up as a username.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET/POST /api/v1/users/
        // List (?search= on username) and direct creation with any role.
        .route("/users/", get(users::list_users).post(users::create_user))
        // GET/PATCH/DELETE /api/v1/users/{username}/
        .route(
            "/users/{username}/",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
}
