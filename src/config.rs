//! Command line and environment configuration

use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::Parser;

/// Default request body ceiling: 64 MiB
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

#[derive(Parser, Debug, Clone)]
#[command(name = "ann-serve")]
#[command(about = "Batched nearest-neighbor search over a pre-built index")]
#[command(version)]
pub struct Cli {
    /// Host to bind to
    #[arg(long, env = "ANN_SERVE_HOST", default_value = "localhost")]
    pub host: String,

    /// Server port
    #[arg(short, long, env = "ANN_SERVE_PORT", default_value = "8080")]
    pub port: u16,

    /// Path to the index file
    #[arg(short, long, env = "ANN_SERVE_INDEX_FILE")]
    pub index_file: PathBuf,

    /// Number of requests searched in parallel
    #[arg(short = 't', long, env = "ANN_SERVE_LISTENER_THREADS", default_value = "4")]
    pub listener_threads: NonZeroUsize,

    /// Results per query when a request does not ask for a count
    #[arg(short = 'k', long, env = "ANN_SERVE_NUM_K", default_value = "800")]
    pub num_k: NonZeroUsize,

    /// HNSW search depth (0 keeps the value stored in the index)
    #[arg(long, env = "ANN_SERVE_HNSW_EF_SEARCH", default_value = "0")]
    pub hnsw_ef_search: usize,

    /// Largest accepted request body in bytes
    #[arg(long, env = "ANN_SERVE_MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,

    /// Enable debug logging
    #[arg(short, long, env = "ANN_SERVE_DEBUG")]
    pub debug: bool,
}

/// Resolved server settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub index_file: PathBuf,
    pub listener_threads: NonZeroUsize,
    pub default_k: NonZeroUsize,
    /// `None` leaves the index's own search effort in place
    pub ef_search: Option<usize>,
    pub max_body_bytes: usize,
    pub debug: bool,
}

impl From<Cli> for ServerConfig {
    fn from(cli: Cli) -> Self {
        Self {
            host: cli.host,
            port: cli.port,
            index_file: cli.index_file,
            listener_threads: cli.listener_threads,
            default_k: cli.num_k,
            ef_search: (cli.hnsw_ef_search != 0).then_some(cli.hnsw_ef_search),
            max_body_bytes: cli.max_body_bytes,
            debug: cli.debug,
        }
    }
}

impl ServerConfig {
    /// `host:port` in the form accepted by `tokio::net::lookup_host`
    pub fn bind_target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Log every field at debug level
    pub fn log(&self) {
        tracing::debug!(host = %self.host, "config");
        tracing::debug!(port = self.port, "config");
        tracing::debug!(index_file = %self.index_file.display(), "config");
        tracing::debug!(listener_threads = self.listener_threads.get(), "config");
        tracing::debug!(default_k = self.default_k.get(), "config");
        tracing::debug!(ef_search = ?self.ef_search, "config");
        tracing::debug!(max_body_bytes = self.max_body_bytes, "config");
    }
}
