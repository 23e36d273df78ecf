// One-shot batch reindex of all publishable content into the search index.
//
// Invoked outside the request path (deploy hook or cron). Idempotent: safe
// to run any number of times, including as the convergence step after a
// degraded publish or a corpus reset.

use std::sync::Arc;

use anyhow::{Context, Result};
use cms_core::domains::articles::{PostgresArticleStore, ReindexJob};
use cms_core::kernel::{AlgoliaClient, BucketStorage, ServerKernel};
use cms_core::Config;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,cms_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    let articles = Arc::new(PostgresArticleStore::new(pool));
    let storage =
        Arc::new(BucketStorage::from_config(&config).context("Failed to build object storage")?);
    let search = Arc::new(
        AlgoliaClient::new(config.search_app_id.clone(), config.search_admin_key.clone())
            .context("Failed to build search client")?,
    );
    let kernel = Arc::new(ServerKernel::new(articles, storage, search));

    let report = ReindexJob::from_config(kernel, &config).run().await?;
    tracing::info!(
        indexed = report.indexed,
        failed = report.failed,
        "reindex finished"
    );

    if report.failed > 0 {
        anyhow::bail!("{} documents failed to index", report.failed);
    }
    Ok(())
}
