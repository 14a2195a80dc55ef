//! Studzy server - main entry point
//!
//! Resolves the data root, opens the SQLite database, connects the LLM
//! provider and serves the HTTP API until Ctrl+C / SIGTERM.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use sqlx::SqlitePool;
use studzy_common::config::{
    default_config_path, RootFolderInitializer, RootFolderResolver, StudzyConfig,
};
use studzy_common::db::init_database;
use studzy_server::db::profiles;
use studzy_server::services::llm::{LlmProvider, OpenAiProvider};
use studzy_server::storage::ObjectStore;
use studzy_server::{build_router, AppState};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often expired session tokens are purged
const TOKEN_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Command-line arguments for studzy-server
#[derive(Parser, Debug)]
#[command(name = "studzy-server")]
#[command(about = "Study portal backend: courses, CBT quizzes and AI study chat")]
#[command(version)]
struct Args {
    /// Data folder holding the database and uploaded resources
    #[arg(short, long, env = "STUDZY_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "STUDZY_PORT")]
    port: Option<u16>,

    /// Configuration file
    #[arg(short, long, env = "STUDZY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "studzy_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Build identification first, before any slow startup work
    info!(
        "Starting Studzy server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let mut config = StudzyConfig::load(&config_path).context("Failed to load configuration")?;
    config.apply_env_overrides();
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let root_folder = RootFolderResolver::new(&config).resolve(args.root_folder.as_deref());
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to create data folder")?;
    info!("Data folder: {}", initializer.root().display());

    let db_path = initializer.database_path();
    info!("Database path: {}", db_path.display());
    let pool = init_database(&db_path)
        .await
        .context("Failed to open database")?;

    let provider = OpenAiProvider::new(&config.llm).context("Failed to build LLM client")?;
    if config.llm.api_key.is_none() {
        warn!("No LLM API key configured; chat and ingestion will fail until one is set");
    }
    let llm: Arc<dyn LlmProvider> = Arc::new(provider);
    info!(
        "LLM provider {} (chat: {}, embeddings: {})",
        config.llm.base_url, config.llm.chat_model, config.llm.embedding_model
    );

    let storage = ObjectStore::new(initializer.storage_path());
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid listen address")?;

    tokio::spawn(purge_expired_tokens(pool.clone()));

    let state = AppState::new(pool, llm, storage, config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("studzy-server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Periodically delete expired session tokens
async fn purge_expired_tokens(pool: SqlitePool) {
    let mut interval = tokio::time::interval(TOKEN_PURGE_INTERVAL);
    loop {
        interval.tick().await;
        match profiles::purge_expired_tokens(&pool).await {
            Ok(0) => {}
            Ok(count) => info!("Purged {} expired session tokens", count),
            Err(e) => error!("Failed to purge expired tokens: {}", e),
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
