use crate::{AppState, handlers::auth};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without credentials: monitoring and the two steps of
/// the confirmation-code login.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers; answers "ok" without touching the database.
        .route("/health", get(|| async { "ok" }))
        // POST /api/v1/auth/signup/
        // Registers (or re-registers) a username/email pair and mails a confirmation code.
        .route("/api/v1/auth/signup/", post(auth::signup))
        // POST /api/v1/auth/token/
        // Trades a valid confirmation code for an access token.
        .route("/api/v1/auth/token/", post(auth::obtain_token))
}
