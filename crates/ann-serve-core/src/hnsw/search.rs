//! Read-only HNSW search
//!
//! **Search**: start at the entry point, greedy descent (beam of 1) through
//! the upper layers, then a beam search on layer 0 keeping `max(ef, k)`
//! candidates. The closest `k` survivors are the answer.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::graph::Graph;
use super::visited::VisitedGuard;
use crate::index::{check_shapes, fill_row, AnnIndex, IndexError, Neighbor};
use crate::simd::l2_distance_squared;
use crate::store::VectorStore;

/// Beam width used when neither the file nor the operator sets one
pub const DEFAULT_EF_SEARCH: usize = 16;

pub struct HnswIndex {
    store: VectorStore,
    graph: Graph,
    ef_search: usize,
}

impl HnswIndex {
    /// Load the graph section of an opened index file
    pub fn from_store(store: VectorStore) -> Result<Self, IndexError> {
        let header = *store.header();
        let mut section = store.trailing_section(header.graph_offset)?;
        let graph = Graph::deserialize(&mut section)?;
        graph.validate(store.count)?;

        let ef_search = match header.ef_search {
            0 => DEFAULT_EF_SEARCH,
            ef => ef as usize,
        };

        tracing::debug!(
            nodes = graph.nodes.len(),
            layers = graph.max_layer + 1,
            edges = graph.edge_count(),
            ef_search,
            "HNSW graph loaded"
        );

        Ok(Self {
            store,
            graph,
            ef_search,
        })
    }

    pub fn ef_search(&self) -> usize {
        self.ef_search
    }

    #[inline]
    fn distance(&self, query: &[f32], id: u32) -> f32 {
        match self.store.get(id as usize) {
            Some(v) => l2_distance_squared(query, v),
            // Graph bounds are validated at load
            None => f32::INFINITY,
        }
    }

    /// Beam search confined to one layer. Returns up to `ef` nodes, ascending.
    fn search_layer(&self, query: &[f32], entry: Neighbor, ef: usize, layer: usize) -> Vec<Neighbor> {
        let mut visited = VisitedGuard::new(self.graph.nodes.len());
        visited.insert(entry.id);

        let capacity = ef.min(self.graph.nodes.len());
        let mut candidates = BinaryHeap::with_capacity(capacity);
        let mut results = BinaryHeap::with_capacity(capacity + 1);
        candidates.push(Reverse(entry));
        results.push(entry);

        while let Some(Reverse(current)) = candidates.pop() {
            let worst = results.peek().map_or(f32::INFINITY, |w: &Neighbor| w.distance);
            if current.distance > worst && results.len() >= ef {
                break;
            }

            for &next in self.graph.neighbors(current.id, layer) {
                if !visited.insert(next) {
                    continue;
                }

                let candidate = Neighbor {
                    id: next,
                    distance: self.distance(query, next),
                };
                let full = results.len() >= ef;
                if full && results.peek().is_some_and(|w| candidate >= *w) {
                    continue;
                }

                candidates.push(Reverse(candidate));
                results.push(candidate);
                if results.len() > ef {
                    results.pop();
                }
            }
        }

        results.into_sorted_vec()
    }

    /// The `k` approximate nearest rows to `query`, ascending
    fn nearest(&self, query: &[f32], k: usize) -> Vec<Neighbor> {
        let Some(entry_id) = self.graph.entry_point else {
            return Vec::new();
        };
        if k == 0 {
            return Vec::new();
        }

        let mut entry = Neighbor {
            id: entry_id,
            distance: self.distance(query, entry_id),
        };
        for layer in (1..=self.graph.max_layer).rev() {
            if let Some(&closest) = self.search_layer(query, entry, 1, layer).first() {
                entry = closest;
            }
        }

        let mut found = self.search_layer(query, entry, self.ef_search.max(k), 0);
        found.truncate(k);
        found
    }
}

impl AnnIndex for HnswIndex {
    fn kind(&self) -> &'static str {
        "hnsw"
    }

    fn dimension(&self) -> usize {
        self.store.dim
    }

    fn len(&self) -> usize {
        self.store.count
    }

    fn search(
        &self,
        queries: &[f32],
        num_queries: usize,
        k: usize,
        distances: &mut [f32],
        labels: &mut [i64],
    ) -> Result<(), IndexError> {
        check_shapes(self.store.dim, queries, num_queries, k, distances, labels)?;
        if num_queries == 0 || k == 0 {
            return Ok(());
        }

        let rows = queries
            .chunks_exact(self.store.dim)
            .zip(distances.chunks_exact_mut(k))
            .zip(labels.chunks_exact_mut(k));
        for ((query, dist_row), label_row) in rows {
            let found = self.nearest(query, k);
            fill_row(&found, self.store.labels(), dist_row, label_row);
        }
        Ok(())
    }

    fn set_search_effort(&mut self, ef: usize) -> Result<(), IndexError> {
        if ef == 0 {
            return Err(IndexError::InvalidParameter {
                parameter: "ef_search",
                value: ef,
            });
        }
        self.ef_search = ef;
        Ok(())
    }
}
