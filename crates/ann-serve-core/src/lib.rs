//! ann-serve core: the read-only engine behind the search service
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              AnnIndex (Send + Sync, &self search)           │
//! ├──────────────────────────────┬──────────────────────────────┤
//! │     HnswIndex (graph walk)   │     FlatIndex (exhaustive)   │
//! ├──────────────────────────────┴──────────────────────────────┤
//! │       VectorStore (mmap: vectors + i64 label id map)        │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod flat;
pub mod format;
pub mod hnsw;
pub mod index;
pub mod simd;
pub mod store;

pub use flat::FlatIndex;
pub use format::{FormatError, IndexHeader, IndexWriter};
pub use hnsw::{Graph, HnswIndex};
pub use index::{load_index, AnnIndex, IndexError, NO_DISTANCE, NO_LABEL};
pub use store::VectorStore;
