use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod confirmation;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod mailer;
pub mod models;
pub mod permissions;
pub mod repository;
pub mod validation;

// Routers grouped by access rule (public, content, authenticated, admin).
pub mod routes;
use auth::AuthUser;
use handlers::{auth as auth_handlers, comments, reviews, taxonomy, titles, users};
use routes::{admin, authenticated, content, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use mailer::{MailerState, MockMailer};
pub use repository::{PostgresRepository, RepositoryState};

/// Path prefix of the versioned REST API.
pub const API_PREFIX: &str = "/api/v1";

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and wire schema into the
/// OpenAPI document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        auth_handlers::signup, auth_handlers::obtain_token,
        taxonomy::list_categories, taxonomy::create_category, taxonomy::delete_category,
        taxonomy::list_genres, taxonomy::create_genre, taxonomy::delete_genre,
        titles::list_titles, titles::get_title, titles::create_title,
        titles::update_title, titles::delete_title,
        reviews::list_reviews, reviews::create_review, reviews::get_review,
        reviews::update_review, reviews::delete_review,
        comments::list_comments, comments::create_comment, comments::get_comment,
        comments::update_comment, comments::delete_comment,
        users::list_users, users::create_user, users::get_user,
        users::update_user, users::delete_user, users::get_me, users::update_me
    ),
    components(
        schemas(
            models::Role, models::TaxonomyEntry, models::Title, models::TitleWritten,
            models::Review, models::Comment, models::UserProfile,
            models::SignupRequest, models::SignupResponse, models::TokenRequest,
            models::TokenResponse, models::TaxonomyPayload, models::TitlePayload,
            models::ReviewPayload, models::CommentPayload, models::UserPayload,
        )
    ),
    tags(
        (name = "yamdb", description = "YaMDb reviews API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, immutable container of shared services, cloned into every
/// request.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: database access behind the `Repository` trait.
    pub repo: RepositoryState,
    /// Mail Layer: delivery of confirmation codes.
    pub mailer: MailerState,
    /// Configuration: the loaded environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Let extractors such as `AuthUser` pull single components out of AppState.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for MailerState {
    fn from_ref(app_state: &AppState) -> MailerState {
        app_state.mailer.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Gate for routers that require a signed-in caller. Extracting `AuthUser`
/// rejects the request with 401 before the handler runs when the bearer
/// token is missing, invalid or names a deleted account.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routers, the auth gate for protected groups, the shared
/// state and the observability layers.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Versioned API: open content plus the two protected groups.
    let api = content::content_routes()
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .merge(
            admin::admin_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        );

    // 3. Base Router Assembly
    let base_router = Router::new()
        // Documentation: Serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .nest(API_PREFIX, api)
        .with_state(state);

    // 4. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                // 4a. Generate an x-request-id for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 4b. Wrap the request/response lifecycle in a span carrying the request id.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 4c. Echo the request id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 5. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the per-request span so every log line of one request shares its
/// `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
