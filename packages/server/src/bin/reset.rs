// Destructive corpus reset: empties both metadata tables (restarting
// identity sequences) and both bucket namespaces.
//
// Out-of-band administrative tool only. Refuses to run without the exact
// confirmation phrase.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cms_core::domains::articles::{PostgresArticleStore, PublishOrchestrator, ResetConfirmation};
use cms_core::kernel::{AlgoliaClient, BucketStorage, ServerKernel};
use cms_core::Config;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(about = "Erase all draft and published content, assets included")]
struct Args {
    /// Must be the exact phrase "erase-all-content"
    #[arg(long)]
    confirm: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,cms_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let confirmation = ResetConfirmation::from_phrase(&args.confirm).with_context(|| {
        format!(
            "refusing to reset: --confirm must be the exact phrase {:?}",
            ResetConfirmation::PHRASE
        )
    })?;

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
    let orchestrator = PublishOrchestrator::new(kernel, config.article_index.clone());

    let report = orchestrator.reset_all(Some(confirmation)).await?;
    tracing::warn!(
        draft_objects_deleted = report.draft_objects_deleted,
        published_objects_deleted = report.published_objects_deleted,
        "corpus reset finished; run the reindex job to converge the search index"
    );
    Ok(())
}
