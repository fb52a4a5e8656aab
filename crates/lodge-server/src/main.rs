//! Lodge API server
//!
//! CRUD over the lodging domain behind one storage engine interface; the
//! backend (flat JSON file or embedded SQLite) is chosen by configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use lodge_store::{BackendKind, StorageEngine, StoreConfig};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("[FATAL] Failed to initialize logging: {e}");
        std::process::exit(1);
    }

    info!("Starting Lodge API server v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run_server().await {
        error!("Server failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run_server() -> Result<()> {
    let config = load_config().await.context("Failed to load configuration")?;
    info!(
        "Config loaded: bind={}, backend={:?}",
        config.bind_address, config.store.backend
    );

    let engine = lodge_store::open(&config.store)
        .await
        .context("Failed to open storage backend")?;
    engine
        .reload()
        .await
        .context("Failed to initialize storage")?;

    let app = lodge_server::app(engine);

    let addr: SocketAddr = config
        .bind_address
        .parse()
        .context("Failed to parse bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Server listening on {addr}");

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

#[derive(Debug, Clone)]
struct Config {
    bind_address: String,
    store: StoreConfig,
}

async fn load_config() -> Result<Config> {
    let data_dir = std::env::var("LODGE_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./data"));
    tokio::fs::create_dir_all(&data_dir)
        .await
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

    let backend: BackendKind = std::env::var("LODGE_STORAGE")
        .unwrap_or_else(|_| "file".to_string())
        .parse()
        .context("Invalid LODGE_STORAGE value")?;

    let mut store = StoreConfig::for_data_dir(backend, &data_dir);
    if let Ok(path) = std::env::var("LODGE_FILE_PATH") {
        store.file_path = PathBuf::from(path);
    }
    if let Ok(path) = std::env::var("LODGE_DATABASE_PATH") {
        store.database_path = PathBuf::from(path);
    }

    let host = std::env::var("LODGE_API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("LODGE_API_PORT").unwrap_or_else(|_| "5000".to_string());

    Ok(Config {
        bind_address: format!("{host}:{port}"),
        store,
    })
}
