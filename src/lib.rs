//! ann-serve: batched nearest-neighbor search over HTTP
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      HTTP API (axum)                        │
//! │          POST /search, semaphore-bounded worker pool        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │     decode  ──▶  SearchService (resolve K)  ──▶  encode     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │             AnnIndex (ann-serve-core, read-only)            │
//! │          HNSW or flat search over a mmap'd index file       │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod request;
pub mod response;
pub mod search;
pub mod server;

pub use config::{Cli, ServerConfig};
pub use error::RequestError;
pub use request::{decode, DecodedRequest, QueryBatch};
pub use response::{encode, SearchResponse};
pub use search::{SearchResults, SearchService, MAX_RESULT_SLOTS};
pub use server::{create_router, serve, AppState};
