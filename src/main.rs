//! ann-serve CLI
//!
//! Loads a pre-built index and answers batched nearest-neighbor queries.
//!
//! # Usage
//!
//! ```bash
//! ann-serve --index-file vectors.idx --port 8080 --num-k 100
//!
//! curl -X POST localhost:8080/search \
//!     -d '{"queries": [[0.1, 0.2, ...]], "top_k": 10}'
//! ```

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ann_serve::{serve, AppState, Cli, SearchService, ServerConfig};
use ann_serve_core::{load_index, AnnIndex};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from(Cli::parse());

    let filter = if config.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    config.log();

    let index = load(&config)?;
    tracing::info!(
        kind = index.kind(),
        vectors = index.len(),
        dimension = index.dimension(),
        "Index loaded from {}",
        config.index_file.display()
    );

    let addr = tokio::net::lookup_host(config.bind_target())
        .await
        .with_context(|| format!("failed to resolve {}", config.bind_target()))?
        .next()
        .with_context(|| format!("{} resolved to no address", config.bind_target()))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    let service = SearchService::new(index, config.default_k);
    let state = Arc::new(AppState::new(service, config.listener_threads));
    serve(state, listener, config.max_body_bytes).await?;

    Ok(())
}

/// Open the index and apply the search-effort override before sharing it
fn load(config: &ServerConfig) -> anyhow::Result<Arc<dyn AnnIndex>> {
    let mut index = load_index(&config.index_file)
        .with_context(|| format!("failed to load index {}", config.index_file.display()))?;

    if let Some(ef) = config.ef_search {
        index
            .set_search_effort(ef)
            .with_context(|| format!("cannot apply --hnsw-ef-search {}", ef))?;
        tracing::debug!(ef_search = ef, "search effort applied");
    }

    Ok(Arc::from(index))
}
