// Main entry point for the CMS API server

use std::sync::Arc;

use anyhow::{Context, Result};
use cms_core::domains::articles::{PostgresArticleStore, PublishOrchestrator};
use cms_core::kernel::{AlgoliaClient, BucketStorage, ServerKernel};
use cms_core::server::{build_app, AppState};
use cms_core::Config;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,cms_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Newsroom CMS API");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    // Wire up the kernel: explicit adapter instances, constructed once.
    let articles = Arc::new(PostgresArticleStore::new(pool.clone()));
    let storage =
        Arc::new(BucketStorage::from_config(&config).context("Failed to build object storage")?);
    let search = Arc::new(
        AlgoliaClient::new(config.search_app_id.clone(), config.search_admin_key.clone())
            .context("Failed to build search client")?,
    );
    let kernel = Arc::new(ServerKernel::new(articles, storage, search));
    let orchestrator = Arc::new(PublishOrchestrator::new(
        Arc::clone(&kernel),
        config.article_index.clone(),
    ));

    let app = build_app(AppState {
        db_pool: pool,
        kernel,
        orchestrator,
    });

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
