mod audit;
mod blob_store;
mod config;
mod db;
mod errors;
mod evaluator;
mod extraction;
mod ingest;
mod llm_client;
mod mail;
mod models;
mod routes;
mod state;
mod store;

#[cfg(test)]
mod testing;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::blob_store::{BlobStore, S3BlobStore};
use crate::config::Config;
use crate::db::create_pool;
use crate::evaluator::Evaluator;
use crate::extraction::TextExtractor;
use crate::ingest::Ingestor;
use crate::llm_client::{CompletionBackend, LlmClient};
use crate::mail::GraphMailSource;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{PgStore, ScreeningStore};

#[derive(Parser)]
#[command(name = "screener")]
#[command(about = "Resume ingestion, extraction and scoring")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Fetch recent mail once and ingest its attachments
    Ingest {
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Poll the mailbox until interrupted
    Watch {
        /// Seconds between passes
        #[arg(long, default_value_t = 300)]
        interval: u64,
        /// Messages per pass
        #[arg(long, default_value_t = 50)]
        batch: usize,
        /// Follow pagination through the whole mailbox on the first pass
        #[arg(long)]
        initial_full: bool,
    },
    /// Rescore keyword-fallback scores with the LLM
    RescoreFallback {
        #[arg(long)]
        job: Option<i64>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Rescore every resume with text against one job
    RescoreJob {
        #[arg(long)]
        job: i64,
    },
    /// Re-extract text for resumes stored without any
    BackfillText {
        #[arg(long)]
        limit: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting screener v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    let store: Arc<dyn ScreeningStore> = Arc::new(PgStore::new(db));

    // Initialize S3 / MinIO
    let blobs: Arc<dyn BlobStore> = Arc::new(S3BlobStore::from_config(&config.storage).await);

    // Initialize LLM client
    let backend = match &config.anthropic_api_key {
        Some(key) => {
            info!("LLM client initialized (model: {})", llm_client::MODEL);
            Some(Arc::new(LlmClient::new(key.clone())) as Arc<dyn CompletionBackend>)
        }
        None => {
            warn!("ANTHROPIC_API_KEY not set; scoring uses keyword fallback only");
            None
        }
    };

    let ingestor = Ingestor::new(
        store.clone(),
        blobs.clone(),
        Evaluator::new(backend),
        TextExtractor::new(config.extraction.clone()),
        config.ingest.clone(),
    );
    let mail = GraphMailSource::new(config.mail.clone());

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let state = AppState {
                store,
                blobs,
                ingestor,
            };
            serve(state, config.port).await?;
        }
        Command::Ingest { limit } => {
            let saved = ingest::poll_mailbox(&ingestor, &mail, limit, false).await?;
            info!("Saved {saved} resume(s)");
        }
        Command::Watch {
            interval,
            batch,
            initial_full,
        } => {
            ingest::watch_mailbox(
                &ingestor,
                &mail,
                batch,
                Duration::from_secs(interval),
                initial_full,
            )
            .await?;
        }
        Command::RescoreFallback { job, limit } => {
            let updated = ingestor.rescore_fallback(job, limit).await?;
            info!("Rescored {updated} fallback score(s)");
        }
        Command::RescoreJob { job } => {
            let updated = ingestor.rescore_job(job).await?;
            info!("Rescored {updated} resume(s) for job {job}");
        }
        Command::BackfillText { limit } => {
            let filled = ingestor.backfill_text(limit).await?;
            info!("Backfilled text for {filled} resume(s)");
        }
    }

    Ok(())
}

async fn serve(state: AppState, port: u16) -> Result<()> {
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
