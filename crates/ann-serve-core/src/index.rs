//! The search contract every loaded index satisfies.
//!
//! # Concurrency Model
//!
//! An index is read-only once loaded: `search` takes `&self` and the trait
//! requires `Send + Sync`, so one `Arc<dyn AnnIndex>` can serve any number of
//! threads without a lock. The only mutation, [`AnnIndex::set_search_effort`],
//! takes `&mut self` and therefore has to happen before the handle is shared.

use std::cmp::Ordering;
use std::path::Path;

use thiserror::Error;

use crate::flat::FlatIndex;
use crate::format::FormatError;
use crate::hnsw::HnswIndex;
use crate::store::VectorStore;

/// Label reported for result slots the index could not fill
pub const NO_LABEL: i64 = -1;

/// Distance reported alongside [`NO_LABEL`]
pub const NO_DISTANCE: f32 = f32::MAX;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("index file error: {0}")]
    Format(#[from] FormatError),

    #[error(
        "search buffers do not fit {num_queries} queries of dimension {dimension} with k={k}"
    )]
    BufferShape {
        num_queries: usize,
        dimension: usize,
        k: usize,
    },

    #[error("{kind} index does not support {parameter}")]
    Unsupported {
        kind: &'static str,
        parameter: &'static str,
    },

    #[error("invalid {parameter}: {value}")]
    InvalidParameter {
        parameter: &'static str,
        value: usize,
    },
}

/// Read-only nearest-neighbor index
pub trait AnnIndex: Send + Sync {
    /// Short engine name for logs
    fn kind(&self) -> &'static str;

    /// Fixed dimension of every vector in the index
    fn dimension(&self) -> usize;

    /// Number of indexed vectors
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Search `num_queries` row-major queries for their `k` nearest vectors.
    ///
    /// Row `i` of `distances` and `labels` (each `num_queries * k` long)
    /// receives the results of query `i` in ascending distance order. Slots
    /// beyond the reachable neighbors are filled with [`NO_LABEL`] and
    /// [`NO_DISTANCE`].
    fn search(
        &self,
        queries: &[f32],
        num_queries: usize,
        k: usize,
        distances: &mut [f32],
        labels: &mut [i64],
    ) -> Result<(), IndexError>;

    /// Tune the recall/latency trade-off. Applied once, before serving.
    fn set_search_effort(&mut self, ef: usize) -> Result<(), IndexError> {
        let _ = ef;
        Err(IndexError::Unsupported {
            kind: self.kind(),
            parameter: "ef_search",
        })
    }
}

/// Open an index file. Files carrying a graph section are served by HNSW,
/// the rest by exhaustive search.
pub fn load_index<P: AsRef<Path>>(path: P) -> Result<Box<dyn AnnIndex>, IndexError> {
    let store = VectorStore::open(path)?;
    let mapped_bytes = store.memory_bytes();
    let index: Box<dyn AnnIndex> = if store.header().has_graph() {
        Box::new(HnswIndex::from_store(store)?)
    } else {
        Box::new(FlatIndex::new(store))
    };

    tracing::debug!(
        kind = index.kind(),
        vectors = index.len(),
        dimension = index.dimension(),
        mapped_bytes,
        "index loaded"
    );
    Ok(index)
}

/// Candidate during search, ordered by distance then id
#[derive(Debug, Clone, Copy)]
pub(crate) struct Neighbor {
    pub id: u32,
    pub distance: f32,
}

impl PartialEq for Neighbor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Neighbor {}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub(crate) fn check_shapes(
    dimension: usize,
    queries: &[f32],
    num_queries: usize,
    k: usize,
    distances: &[f32],
    labels: &[i64],
) -> Result<(), IndexError> {
    let fits = num_queries
        .checked_mul(dimension)
        .is_some_and(|n| n == queries.len())
        && num_queries
            .checked_mul(k)
            .is_some_and(|n| n == distances.len() && n == labels.len());

    if fits {
        Ok(())
    } else {
        Err(IndexError::BufferShape {
            num_queries,
            dimension,
            k,
        })
    }
}

/// Write sorted `found` neighbors into one result row, translating row ids to
/// labels and padding the tail.
pub(crate) fn fill_row(
    found: &[Neighbor],
    id_map: &[i64],
    distances: &mut [f32],
    labels: &mut [i64],
) {
    for (slot, (dist, label)) in distances.iter_mut().zip(labels.iter_mut()).enumerate() {
        match found.get(slot) {
            Some(n) => {
                // Overflowed sums stay numeric
                *dist = n.distance.min(NO_DISTANCE);
                *label = id_map.get(n.id as usize).copied().unwrap_or(NO_LABEL);
            }
            None => {
                *dist = NO_DISTANCE;
                *label = NO_LABEL;
            }
        }
    }
}
