//! Exhaustive (exact) search over every stored vector.

use std::collections::BinaryHeap;

use crate::index::{check_shapes, fill_row, AnnIndex, IndexError, Neighbor};
use crate::simd::l2_distance_squared;
use crate::store::VectorStore;

pub struct FlatIndex {
    store: VectorStore,
}

impl FlatIndex {
    pub fn new(store: VectorStore) -> Self {
        Self { store }
    }

    /// The `k` closest rows to `query`, ascending
    fn nearest(&self, query: &[f32], k: usize) -> Vec<Neighbor> {
        if k == 0 {
            return Vec::new();
        }

        // Max-heap holding the best k seen so far; the root is the worst
        let capacity = k.min(self.store.count) + 1;
        let mut best: BinaryHeap<Neighbor> = BinaryHeap::with_capacity(capacity);
        let rows = self.store.vectors().chunks_exact(self.store.dim);
        for (id, row) in rows.enumerate() {
            let candidate = Neighbor {
                id: id as u32,
                distance: l2_distance_squared(query, row),
            };
            if best.len() < k {
                best.push(candidate);
            } else if best.peek().is_some_and(|worst| candidate < *worst) {
                best.pop();
                best.push(candidate);
            }
        }

        best.into_sorted_vec()
    }
}

impl AnnIndex for FlatIndex {
    fn kind(&self) -> &'static str {
        "flat"
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::IndexWriter;
    use crate::index::{NO_DISTANCE, NO_LABEL};
    use tempfile::{tempdir, TempDir};

    fn line_index(n: usize) -> (TempDir, FlatIndex) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("line.idx");
        let mut writer = IndexWriter::new(&path, 2).unwrap();
        for i in 0..n {
            writer.add(1000 + i as i64, &[i as f32, 0.0]).unwrap();
        }
        writer.finish().unwrap();
        let store = VectorStore::open(&path).unwrap();
        (dir, FlatIndex::new(store))
    }

    #[test]
    fn test_exact_order_and_labels() {
        let (_dir, index) = line_index(10);
        let query = [3.2, 0.0];
        let mut distances = vec![0.0; 3];
        let mut labels = vec![0; 3];

        index.search(&query, 1, 3, &mut distances, &mut labels).unwrap();

        assert_eq!(labels, vec![1003, 1004, 1002]);
        assert!((distances[0] - 0.04).abs() < 1e-5);
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_rows_follow_query_order() {
        let (_dir, index) = line_index(10);
        let queries = [9.0, 0.0, 0.0, 0.0, 5.0, 0.0];
        let mut distances = vec![0.0; 3];
        let mut labels = vec![0; 3];

        index.search(&queries, 3, 1, &mut distances, &mut labels).unwrap();

        assert_eq!(labels, vec![1009, 1000, 1005]);
        assert_eq!(distances, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_k_larger_than_index_is_padded() {
        let (_dir, index) = line_index(2);
        let mut distances = vec![0.0; 4];
        let mut labels = vec![0; 4];

        index.search(&[0.0, 0.0], 1, 4, &mut distances, &mut labels).unwrap();

        assert_eq!(labels, vec![1000, 1001, NO_LABEL, NO_LABEL]);
        assert_eq!(distances[2], NO_DISTANCE);
    }

    #[test]
    fn test_huge_k_on_tiny_index() {
        let (_dir, index) = line_index(2);
        let k = 1 << 20;
        let mut distances = vec![0.0; k];
        let mut labels = vec![0; k];

        index.search(&[1.0, 0.0], 1, k, &mut distances, &mut labels).unwrap();

        assert_eq!(&labels[..2], &[1001, 1000]);
        assert!(labels[2..].iter().all(|&l| l == NO_LABEL));
    }

    #[test]
    fn test_overflowing_distance_stays_finite() {
        let (_dir, index) = line_index(2);
        let mut distances = vec![0.0; 2];
        let mut labels = vec![0; 2];

        index
            .search(&[3.0e38, 0.0], 1, 2, &mut distances, &mut labels)
            .unwrap();

        assert_eq!(labels, vec![1000, 1001]);
        assert_eq!(distances, vec![f32::MAX, f32::MAX]);
    }

    #[test]
    fn test_buffer_shape_mismatch() {
        let (_dir, index) = line_index(2);
        let mut distances = vec![0.0; 2];
        let mut labels = vec![0; 2];

        let result = index.search(&[0.0, 0.0, 1.0], 1, 2, &mut distances, &mut labels);
        assert!(matches!(result, Err(IndexError::BufferShape { .. })));
    }
}
