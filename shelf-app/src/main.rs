use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use shelf_common::observability::init_logging;
use shelf_config::{FetchConfig, ShelfConfig, ShelfConfigLoader};
use shelf_http::{FetchOptions, HttpClient};
use shelf_server::{AppState, build_app};
use shelf_store::ArticleStore;
use shelf_web::HttpFetcher;

#[derive(Parser, Debug)]
#[command(name = "shelf", version, about = "Save links now, read them later")]
struct Cli {
    /// YAML config file; skipped when absent. `SHELF__*` variables override it.
    #[arg(long, env = "SHELF_CONFIG", default_value = "shelf.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1) Load config (env wins)
    let cfg: ShelfConfig = ShelfConfigLoader::new()
        .with_optional_file(&cli.config)
        .load()
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;

    let log_path = init_logging(cfg.log.to_log_config("shelf"))?;
    tracing::info!(config = %cli.config.display(), log = %log_path.display(), "shelf.starting");

    let store = ArticleStore::connect(&cfg.database.url, cfg.database.max_connections)
        .await
        .context("failed to open article database")?;

    let client = HttpClient::new(fetch_options(&cfg.fetch)).context("failed to build HTTP client")?;
    let state = AppState::new(
        store,
        Arc::new(HttpFetcher::new(client)),
        cfg.server.api_key.as_str(),
    );

    let listener = tokio::net::TcpListener::bind(&cfg.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", cfg.server.bind))?;
    tracing::info!(addr = %listener.local_addr()?, "shelf.listening");

    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("shelf.stopped");
    Ok(())
}

fn fetch_options(fetch: &FetchConfig) -> FetchOptions {
    FetchOptions {
        timeout: fetch.timeout(),
        connect_timeout: fetch.connect_timeout(),
        max_retries: fetch.max_retries,
        max_body_bytes: fetch.max_body_bytes,
        user_agent: fetch.user_agent.clone(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shelf.shutdown_requested");
}
