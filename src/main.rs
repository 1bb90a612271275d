//! HTTP entry point. Wires configuration, the shard store, the embedding
//! provider and the `axum` router together, then serves forever.
//!
//! Per `SPEC_FULL.md` §6 "CLI/exit codes": the process exits non-zero only
//! on socket bind failure. Uncaught errors inside request handlers and
//! background tasks are logged (see `docrag::error` and `docrag::tasks`)
//! but never kill the process.

use std::sync::Arc;

use docrag::api::{self, AppState};
use docrag::providers::{EmbeddingProvider, HttpProvider};
use docrag::store::{FlatStore, ShardStore};
use docrag::types::Settings;
use docrag::Config;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut config = Config::from_env();
    let settings_store: FlatStore<Settings> = FlatStore::new(config.data_dir.join("settings.json"));
    config.apply_settings_fallback(&settings_store.read().await);

    let store = ShardStore::new(&config.data_dir);
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HttpProvider::new(
        config.provider_base_url.clone(),
        config.provider_api_key.clone(),
        config.embedding_model.clone(),
        config.chat_model.clone(),
    ));

    let state = AppState::new(config.clone(), store, embedder);
    let recovery_queue = state.orchestrator.tasks().clone();
    tokio::spawn(async move { recovery_queue.recover_after_restart().await });

    let app = api::router(state);

    let bind_address = format!("0.0.0.0:{}", config.port);
    let listener = match TcpListener::bind(&bind_address).await {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("failed to bind {bind_address}: {err}");
            std::process::exit(1);
        }
    };
    info!(address = %bind_address, "docrag listening");

    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!(error = %err, "server loop exited with an error");
    }
}
