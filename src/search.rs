//! Search orchestration
//!
//! One request goes `Received -> Decoded -> Dispatched -> Encoded -> Done`.
//! Any stage may fail; the failure comes back as a [`RequestError`] value and
//! the index is never called for a request that did not decode cleanly.

use std::num::NonZeroUsize;
use std::sync::Arc;

use ann_serve_core::{AnnIndex, NO_DISTANCE, NO_LABEL};

use crate::error::RequestError;
use crate::request::{decode, QueryBatch};
use crate::response::encode;

/// Upper bound on `num_queries * k` for a single request. Keeps the result
/// buffers near 48 MiB and the encoded body under a few hundred MiB.
pub const MAX_RESULT_SLOTS: usize = 1 << 22;

/// Result matrices of one request, row-major `num_queries x k`
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResults {
    pub labels: Vec<i64>,
    pub distances: Vec<f32>,
    pub k: usize,
    pub num_queries: usize,
}

/// Drives decode, search and encode against the shared index.
///
/// Cloning is cheap; every clone searches the same loaded index.
#[derive(Clone)]
pub struct SearchService {
    index: Arc<dyn AnnIndex>,
    default_k: usize,
}

impl SearchService {
    pub fn new(index: Arc<dyn AnnIndex>, default_k: NonZeroUsize) -> Self {
        Self {
            index,
            default_k: default_k.get(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    pub fn default_k(&self) -> usize {
        self.default_k
    }

    /// Positive request value wins, anything else falls back to the default.
    pub fn resolve_k(&self, requested: Option<i64>) -> usize {
        match requested {
            Some(k) if k > 0 => usize::try_from(k).unwrap_or(usize::MAX),
            _ => self.default_k,
        }
    }

    /// Search a validated batch with a fixed `k`.
    pub fn search(&self, batch: &QueryBatch, k: usize) -> Result<SearchResults, RequestError> {
        let num_queries = batch.num_queries;
        if batch.is_empty() {
            return Ok(SearchResults {
                labels: Vec::new(),
                distances: Vec::new(),
                k,
                num_queries,
            });
        }

        let slots = num_queries
            .checked_mul(k)
            .filter(|&slots| slots <= MAX_RESULT_SLOTS)
            .ok_or(RequestError::ResultTooLarge {
                num_queries,
                k,
                limit: MAX_RESULT_SLOTS,
            })?;

        let mut labels = vec![NO_LABEL; slots];
        let mut distances = vec![NO_DISTANCE; slots];
        self.index
            .search(&batch.vectors, num_queries, k, &mut distances, &mut labels)?;

        Ok(SearchResults {
            labels,
            distances,
            k,
            num_queries,
        })
    }

    /// Run the whole pipeline for one raw request body.
    pub fn handle(&self, body: &[u8]) -> Result<Vec<u8>, RequestError> {
        let request = decode(body, self.index.dimension())?;
        let k = self.resolve_k(request.top_k);
        tracing::trace!(queries = request.batch.num_queries, k, "request decoded");

        let results = self.search(&request.batch, k)?;
        tracing::trace!(queries = results.num_queries, k, "search complete");

        encode(
            &results.labels,
            &results.distances,
            results.k,
            results.num_queries,
        )
    }
}
