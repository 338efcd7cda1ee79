use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use yamdb_api::{
    AppState,
    config::{AppConfig, BootstrapAdmin, Env},
    create_router, mailer,
    models::{NewUser, Role},
    repository::{PostgresRepository, RepositoryState},
};

/// Creates the configured superuser unless an account with that username exists.
async fn ensure_bootstrap_admin(
    repo: &RepositoryState,
    admin: &BootstrapAdmin,
) -> Result<(), sqlx::Error> {
    if repo.get_user_by_username(&admin.username).await?.is_some() {
        tracing::debug!(username = %admin.username, "Bootstrap admin already present");
        return Ok(());
    }
    let user = repo
        .create_user(NewUser {
            username: admin.username.clone(),
            email: admin.email.clone(),
            role: Role::Admin,
            is_superuser: true,
            ..NewUser::default()
        })
        .await?;
    tracing::info!(user_id = user.id, username = %user.username, "Bootstrap admin created");
    Ok(())
}

/// main
///
/// Initializes configuration, logging, the database, the mailer and the HTTP
/// server, in that order.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging Filter Setup
    // RUST_LOG takes precedence over the defaults below.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "yamdb_api=debug,tower_http=info".into());

    // 3. Initialize Logging based on Environment
    match config.env {
        Env::Local => {
            // LOCAL: Pretty print output for human readability.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // PROD: JSON lines for log aggregators.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Database Initialization (Postgres) and schema migrations
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("FATAL: Database migrations failed.");
    tracing::info!("Database migrations applied.");

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    if let Some(admin) = &config.bootstrap_admin {
        ensure_bootstrap_admin(&repo, admin)
            .await
            .expect("FATAL: Could not create the bootstrap admin.");
    }

    // 5. Mail Initialization: SMTP relay when configured, log output otherwise.
    let mailer = mailer::from_config(&config);
    if config.smtp.is_none() {
        tracing::warn!("SMTP_HOST not set; confirmation codes are written to the log.");
    }

    // 6. Unified State Assembly
    let bind_addr = config.bind_addr.clone();
    let app_state = AppState {
        repo,
        mailer,
        config,
    };

    // 7. Router and Server Startup
    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Could not bind the HTTP listener. Check BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: /swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server error.");
}
