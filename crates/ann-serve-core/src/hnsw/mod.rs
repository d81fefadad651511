//! HNSW (Hierarchical Navigable Small World) search over a pre-built graph
//!
//! The graph is produced offline and stored in the index file; this module
//! only loads and walks it.
//!
//! ```text
//! Layer 2: o-----------------o         (few nodes, long hops)
//!          |                 |
//! Layer 1: o-----o-----o-----o
//!          |     |     |     |
//! Layer 0: o-o-o-o-o-o-o-o-o-o-o-o     (every node)
//! ```

mod graph;
mod search;
mod serialize;
mod visited;

pub use graph::{Graph, Node};
pub use search::{HnswIndex, DEFAULT_EF_SEARCH};
