//! Response encoding
//!
//! A pure serializer: rows come out in query order with the ranking the index
//! produced. Nothing is sorted, merged or dropped here.

use serde::Serialize;

use crate::error::RequestError;

/// Borrowed view of the two result matrices, one row per query
#[derive(Debug, Serialize)]
pub struct SearchResponse<'a> {
    pub distances: Vec<&'a [f32]>,
    pub indices: Vec<&'a [i64]>,
}

impl<'a> SearchResponse<'a> {
    /// Split row-major `num_queries x k` buffers into rows.
    pub fn from_matrices(labels: &'a [i64], distances: &'a [f32], k: usize, num_queries: usize) -> Self {
        debug_assert_eq!(labels.len(), k * num_queries);
        debug_assert_eq!(distances.len(), k * num_queries);

        Self {
            distances: rows(distances, k, num_queries),
            indices: rows(labels, k, num_queries),
        }
    }
}

fn rows<T>(matrix: &[T], k: usize, num_queries: usize) -> Vec<&[T]> {
    if k == 0 {
        return vec![&[][..]; num_queries];
    }
    matrix.chunks_exact(k).take(num_queries).collect()
}

/// Serialize `num_queries x k` results as `{"distances": [[..]], "indices": [[..]]}`.
pub fn encode(
    labels: &[i64],
    distances: &[f32],
    k: usize,
    num_queries: usize,
) -> Result<Vec<u8>, RequestError> {
    let response = SearchResponse::from_matrices(labels, distances, k, num_queries);
    Ok(serde_json::to_vec(&response)?)
}
