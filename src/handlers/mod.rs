//! Request handlers, grouped by resource.
//!
//! Handlers resolve the caller (`Option<AuthUser>` where anonymous reads are
//! allowed), consult a predicate from [`crate::permissions`], validate the
//! payload and delegate to the repository.

pub mod auth;
pub mod comments;
pub mod reviews;
pub mod taxonomy;
pub mod titles;
pub mod users;
