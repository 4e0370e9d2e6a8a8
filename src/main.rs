use std::sync::Arc;

use clap::Parser;

use folio::app::{build_router, AppState};
use folio::config::AppConfig;
use folio::db::memory::MemoryDocumentRepository;
use folio::db::repository::{DocumentRepository, MongoDocumentRepository};
use folio::propagation::queue::PropagationQueue;

/// Folio wiki server.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Configuration file (TOML), without or with extension.
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.clone().into()),
        )
        .init();

    tracing::info!("Starting Folio server...");

    let document_repo: Arc<dyn DocumentRepository> = match &config.mongodb_uri {
        Some(uri) if !config.demo_mode() => {
            let client = mongodb::Client::with_uri_str(uri).await?;
            let db = client.database(&config.mongodb_database);
            tracing::info!("Connected to MongoDB database '{}'", config.mongodb_database);
            Arc::new(MongoDocumentRepository::new(&db))
        }
        _ => {
            tracing::warn!("No MongoDB URI configured, documents are kept in memory (demo mode)");
            Arc::new(MemoryDocumentRepository::new())
        }
    };

    let (propagation, worker) =
        PropagationQueue::start(document_repo.clone(), config.propagation_queue_capacity);

    let app = build_router(AppState {
        document_repo,
        propagation,
    });

    tracing::info!("Listening on http://{}", config.server_addr);
    let listener = tokio::net::TcpListener::bind(&config.server_addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    worker.abort();
    Ok(())
}
