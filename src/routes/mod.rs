/// Router Module Index
///
/// Routes are grouped by the access rule that applies to them. Where a router
/// is mounted behind `auth_middleware`, every handler in it can rely on an
/// authenticated caller; the other routers resolve the caller per handler.

/// Health check and the signup / token endpoints. No credentials needed.
pub mod public;

/// Catalog (categories, genres, titles) and the reviews/comments under it.
/// Anyone may read; each write handler applies its own role predicate.
pub mod content;

/// The caller's own profile (`users/me/`). Requires authentication.
pub mod authenticated;

/// Account management. Requires authentication, and the handlers require
/// the admin role.
pub mod admin;
