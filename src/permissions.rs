//! Role predicates consulted by handlers before touching the repository.
//!
//! An anonymous caller that fails a check gets 401 so the client knows to
//! authenticate; an authenticated caller with the wrong role gets 403.

use axum::http::Method;

use crate::{auth::AuthUser, error::AppError};

const NOT_AUTHENTICATED: &str = "Authentication credentials were not provided.";
const NOT_PERMITTED: &str = "You do not have permission to perform this action.";

/// GET, HEAD and OPTIONS never mutate state.
pub fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Any authenticated caller. Creating reviews and comments needs only this.
pub fn authenticated(user: Option<&AuthUser>) -> Result<&AuthUser, AppError> {
    user.ok_or(AppError::Unauthorized(NOT_AUTHENTICATED))
}

/// Admin-only: the caller must be an authenticated admin or superuser.
pub fn admin_only(user: Option<&AuthUser>) -> Result<&AuthUser, AppError> {
    let user = authenticated(user)?;
    if user.is_admin() {
        Ok(user)
    } else {
        Err(AppError::Forbidden(NOT_PERMITTED))
    }
}

/// Admin-or-read-only: anyone may read, only admins may write.
pub fn admin_or_read_only(user: Option<&AuthUser>, method: &Method) -> Result<(), AppError> {
    if is_safe_method(method) {
        return Ok(());
    }
    admin_only(user).map(|_| ())
}

/// Author/moderator/admin: modifying an existing review or comment requires
/// being its author or holding an elevated role.
pub fn author_moderator_or_admin(
    user: Option<&AuthUser>,
    method: &Method,
    author_id: i64,
) -> Result<(), AppError> {
    if is_safe_method(method) {
        return Ok(());
    }
    let user = authenticated(user)?;
    if user.id == author_id || user.is_moderator() || user.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden(NOT_PERMITTED))
    }
}
