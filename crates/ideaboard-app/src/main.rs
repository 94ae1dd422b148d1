mod app;
mod command;
mod config;
mod page;
mod render;

use tracing::info;

use ideaboard_backend::{MemoryBackend, PostgrestClient};
use ideaboard_cache::QueryCache;
use ideaboard_data::DataClient;

use config::{BackendKind, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr; stdout carries the page
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ideaboard=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;
    let cache = QueryCache::new();
    let input = tokio::io::BufReader::new(tokio::io::stdin());
    let output = tokio::io::stdout();

    match config.kind {
        BackendKind::Postgrest => {
            info!("Using PostgREST backend at {}", config.backend.url);
            let client = DataClient::new(PostgrestClient::new(&config.backend), cache);
            app::run(client, input, output).await
        }
        BackendKind::Memory => {
            info!("Using in-memory backend, nothing will be persisted");
            let client = DataClient::new(MemoryBackend::new(), cache);
            app::run(client, input, output).await
        }
    }
}
