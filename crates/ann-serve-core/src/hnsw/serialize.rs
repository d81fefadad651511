use std::io::{self, Read, Write};

use super::graph::{Graph, Node};
use crate::format::FormatError;

const GRAPH_MAGIC: &[u8; 8] = b"ANNGRAPH";

/// Upper bound on layers per node; real graphs stay far below this.
const MAX_LAYERS: usize = 64;

impl Graph {
    /// Serialize the graph.
    ///
    /// Format:
    /// - Magic: "ANNGRAPH" (8 bytes)
    /// - NumNodes: u32, EntryPoint: u32 (u32::MAX if none), MaxLayer: u8, M: u32
    /// - Per node: LayerCount: u8, then per layer
    ///   NeighborCount: u32 followed by that many u32 ids
    pub fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(GRAPH_MAGIC)?;
        writer.write_all(&(self.nodes.len() as u32).to_le_bytes())?;
        writer.write_all(&self.entry_point.unwrap_or(u32::MAX).to_le_bytes())?;
        writer.write_all(&[self.max_layer as u8])?;
        writer.write_all(&(self.m as u32).to_le_bytes())?;

        for node in &self.nodes {
            writer.write_all(&[node.layers.len() as u8])?;
            for neighbors in &node.layers {
                writer.write_all(&(neighbors.len() as u32).to_le_bytes())?;
                for &id in neighbors {
                    writer.write_all(&id.to_le_bytes())?;
                }
            }
        }
        Ok(())
    }

    /// Read a graph previously written by [`Graph::serialize`].
    ///
    /// Neighbor counts are checked against the node count before allocating,
    /// so a corrupt section cannot request unbounded memory.
    pub fn deserialize<R: Read>(reader: &mut R) -> Result<Self, FormatError> {
        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;
        if &magic != GRAPH_MAGIC {
            return Err(FormatError::CorruptGraph("invalid graph magic".into()));
        }

        let num_nodes = read_u32(reader)? as usize;
        let entry_raw = read_u32(reader)?;
        let max_layer = read_u8(reader)? as usize;
        let m = read_u32(reader)? as usize;

        let mut nodes = Vec::with_capacity(num_nodes.min(1 << 20));
        for id in 0..num_nodes {
            let layer_count = read_u8(reader)? as usize;
            if layer_count > MAX_LAYERS {
                return Err(FormatError::CorruptGraph(format!(
                    "node {} claims {} layers",
                    id, layer_count
                )));
            }

            let mut layers = Vec::with_capacity(layer_count);
            for _ in 0..layer_count {
                let count = read_u32(reader)? as usize;
                if count > num_nodes {
                    return Err(FormatError::CorruptGraph(format!(
                        "node {} claims {} neighbors in a graph of {}",
                        id, count, num_nodes
                    )));
                }
                let mut neighbors = Vec::with_capacity(count);
                for _ in 0..count {
                    neighbors.push(read_u32(reader)?);
                }
                layers.push(neighbors);
            }
            nodes.push(Node { layers });
        }

        Ok(Graph {
            nodes,
            entry_point: (entry_raw != u32::MAX).then_some(entry_raw),
            max_layer,
            m,
        })
    }
}

fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u8<R: Read>(reader: &mut R) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_graph() -> Graph {
        let mut graph = Graph::new(8);
        graph.push_node(vec![vec![1, 2]]);
        graph.push_node(vec![vec![0, 2], vec![2]]);
        graph.push_node(vec![vec![0, 1], vec![1]]);
        graph
    }

    #[test]
    fn test_serialize_then_deserialize() {
        let graph = sample_graph();
        let mut bytes = Vec::new();
        graph.serialize(&mut bytes).unwrap();

        let loaded = Graph::deserialize(&mut bytes.as_slice()).unwrap();
        assert_eq!(loaded, graph);
    }

    #[test]
    fn test_truncated_section() {
        let mut bytes = Vec::new();
        sample_graph().serialize(&mut bytes).unwrap();
        bytes.truncate(bytes.len() - 3);

        assert!(matches!(
            Graph::deserialize(&mut bytes.as_slice()),
            Err(FormatError::Io(_))
        ));
    }

    #[test]
    fn test_rejects_absurd_neighbor_count() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(GRAPH_MAGIC);
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.push(0);
        bytes.extend_from_slice(&4u32.to_le_bytes());
        bytes.push(1);
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());

        assert!(matches!(
            Graph::deserialize(&mut bytes.as_slice()),
            Err(FormatError::CorruptGraph(_))
        ));
    }
}
