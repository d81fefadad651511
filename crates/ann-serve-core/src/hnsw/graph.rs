//! Adjacency of a pre-built HNSW graph

use crate::format::FormatError;

/// A vertex of the graph. Its id is its position in `Graph::nodes`, which is
/// also the row of its vector in the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Node {
    /// `layers[0]` is the base layer every node lives on
    pub layers: Vec<Vec<u32>>,
}

impl Node {
    /// Highest layer this node is linked on
    pub fn top_layer(&self) -> usize {
        self.layers.len().saturating_sub(1)
    }

    /// Neighbors at `layer`, empty above the node's top layer
    #[inline]
    pub fn neighbors(&self, layer: usize) -> &[u32] {
        self.layers.get(layer).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

/// Read-only multi-layer proximity graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub entry_point: Option<u32>,
    pub max_layer: usize,
    /// Max neighbors per upper layer the graph was built with
    pub m: usize,
}

impl Graph {
    pub fn new(m: usize) -> Self {
        Self {
            nodes: Vec::new(),
            entry_point: None,
            max_layer: 0,
            m,
        }
    }

    /// Append a node with the given per-layer adjacency. The first node, and
    /// any node reaching above the current top layer, becomes the entry point.
    pub fn push_node(&mut self, layers: Vec<Vec<u32>>) -> u32 {
        let id = self.nodes.len() as u32;
        let node = Node { layers };
        let top = node.top_layer();

        if self.entry_point.is_none() || top > self.max_layer {
            self.entry_point = Some(id);
            self.max_layer = top;
        }
        self.nodes.push(node);
        id
    }

    #[inline]
    pub fn neighbors(&self, id: u32, layer: usize) -> &[u32] {
        self.nodes
            .get(id as usize)
            .map(|n| n.neighbors(layer))
            .unwrap_or(&[])
    }

    /// Total directed edges across all layers
    pub fn edge_count(&self) -> usize {
        self.nodes
            .iter()
            .flat_map(|n| n.layers.iter())
            .map(|l| l.len())
            .sum()
    }

    /// Check that the graph covers exactly `count` vectors and that every
    /// reference stays in bounds.
    pub fn validate(&self, count: usize) -> Result<(), FormatError> {
        if self.nodes.len() != count {
            return Err(FormatError::CorruptGraph(format!(
                "graph has {} nodes for {} vectors",
                self.nodes.len(),
                count
            )));
        }

        match self.entry_point {
            None if count > 0 => {
                return Err(FormatError::CorruptGraph("missing entry point".into()));
            }
            Some(entry) => {
                let Some(node) = self.nodes.get(entry as usize) else {
                    return Err(FormatError::CorruptGraph(format!(
                        "entry point {} out of bounds",
                        entry
                    )));
                };
                if node.top_layer() < self.max_layer {
                    return Err(FormatError::CorruptGraph(format!(
                        "entry point {} does not reach layer {}",
                        entry, self.max_layer
                    )));
                }
            }
            None => {}
        }

        for (id, node) in self.nodes.iter().enumerate() {
            if node.layers.is_empty() {
                return Err(FormatError::CorruptGraph(format!(
                    "node {} has no base layer",
                    id
                )));
            }
            for &neighbor in node.layers.iter().flatten() {
                if neighbor as usize >= count {
                    return Err(FormatError::CorruptGraph(format!(
                        "node {} links to {} (only {} vectors)",
                        id, neighbor, count
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_tracks_entry_point() {
        let mut graph = Graph::new(4);
        assert_eq!(graph.push_node(vec![vec![1]]), 0);
        assert_eq!(graph.entry_point, Some(0));

        graph.push_node(vec![vec![0, 2], vec![2]]);
        assert_eq!(graph.entry_point, Some(1));
        assert_eq!(graph.max_layer, 1);

        graph.push_node(vec![vec![1], vec![1]]);
        // Same height does not steal the entry point
        assert_eq!(graph.entry_point, Some(1));
        assert_eq!(graph.edge_count(), 6);
    }

    #[test]
    fn test_neighbors_above_top_layer_are_empty() {
        let mut graph = Graph::new(4);
        graph.push_node(vec![vec![1]]);
        graph.push_node(vec![vec![0]]);

        assert_eq!(graph.neighbors(0, 0), &[1]);
        assert!(graph.neighbors(0, 3).is_empty());
        assert!(graph.neighbors(99, 0).is_empty());
    }

    #[test]
    fn test_validate_out_of_bounds_neighbor() {
        let mut graph = Graph::new(4);
        graph.push_node(vec![vec![5]]);
        assert!(matches!(graph.validate(1), Err(FormatError::CorruptGraph(_))));
    }

    #[test]
    fn test_validate_node_count() {
        let mut graph = Graph::new(4);
        graph.push_node(vec![vec![]]);
        assert!(graph.validate(1).is_ok());
        assert!(graph.validate(2).is_err());
    }

    #[test]
    fn test_validate_empty_graph() {
        assert!(Graph::new(4).validate(0).is_ok());
    }
}
