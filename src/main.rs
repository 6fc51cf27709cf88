use judgment_notes::{
    AppState,
    bootstrap::{BootstrapOutcome, ensure_admin},
    config::{AppConfig, Env},
    create_router,
    repository::{PostgresRepository, RepositoryState},
};
use sqlx::{migrate::Migrator, postgres::PgPoolOptions};
use std::{path::Path, process, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Logs a fatal startup error and exits non-zero.
fn fatal(context: &str, err: impl std::fmt::Display) -> ! {
    tracing::error!(error = %err, "{context}");
    process::exit(1);
}

/// main
///
/// Startup sequence: configuration, logging, database pool, migrations, optional
/// admin bootstrap, then the HTTP server. Every step before serving is fail-fast.
#[tokio::main]
async fn main() {
    // 1. Configuration
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging. RUST_LOG overrides the default filter.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "judgment_notes=debug,tower_http=info".into());

    // Pretty output locally, JSON when the environment says production. A config
    // error is reported in the pretty format since the environment is unknown.
    let log_env = config.as_ref().map(|c| c.env).unwrap_or(Env::Local);
    match log_env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    let config = config.unwrap_or_else(|e| fatal("invalid configuration", e));
    tracing::info!("Application starting in {:?} mode", config.env);

    if config.uses_dev_secret() {
        tracing::warn!("JWT_SECRET is not set; using the local development secret");
    }

    // 3. Database
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.db_url)
        .await
        .unwrap_or_else(|e| fatal("failed to connect to Postgres, check DATABASE_URL", e));

    // 4. Migrations, loaded from disk at runtime.
    let migrator = Migrator::new(Path::new(&config.migrations_dir))
        .await
        .unwrap_or_else(|e| fatal("failed to load migrations", e));
    migrator
        .run(&pool)
        .await
        .unwrap_or_else(|e| fatal("failed to apply migrations", e));
    tracing::info!(dir = %config.migrations_dir, "migrations applied");

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 5. First admin, if configured.
    if let Some(admin) = &config.bootstrap_admin {
        match ensure_admin(repo.as_ref(), admin).await {
            Ok(BootstrapOutcome::Created) => tracing::info!("bootstrap admin account created"),
            Ok(BootstrapOutcome::AlreadyPresent) => {
                tracing::debug!("bootstrap admin account already present")
            }
            Err(e) => fatal("failed to bootstrap admin account", e),
        }
    }

    // 6. Router and server
    let port = config.port;
    let app = create_router(AppState::new(repo, config));

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| fatal("failed to bind listener", e));

    tracing::info!("Listening on {addr}");
    tracing::info!(
        "API Documentation (Swagger UI) available at: http://localhost:{port}/swagger-ui"
    );

    if let Err(e) = axum::serve(listener, app).await {
        fatal("server error", e);
    }
}
