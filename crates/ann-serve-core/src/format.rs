//! Index file format
//!
//! # File Structure
//!
//! ```text
//! Offset   Size    Type        Description
//! ─────────────────────────────────────────────────
//! 0x00     8       [u8; 8]     Magic: "ANNIDX01"
//! 0x08     4       u32 LE      Version (1)
//! 0x0C     4       u32 LE      Flags (bit 0 = graph section present)
//! 0x10     8       u64 LE      N: Number of vectors
//! 0x18     4       u32 LE      D: Dimensions
//! 0x1C     4       u32 LE      Default ef_search for the graph (0 = unset)
//! 0x20     8       u64 LE      Vectors section offset (always 64)
//! 0x28     8       u64 LE      Labels section offset (8-byte aligned)
//! 0x30     8       u64 LE      Graph section offset (0 if none)
//! 0x38     8       [u8; 8]     Reserved
//! ─────────────────────────────────────────────────
//! 0x40     N*D*4   [f32]       Vectors, row-major
//! ...      N*8     [i64]       External label of each vector (id map)
//! ...      var     graph       See `hnsw::Graph::serialize`
//! ```
//!
//! The vectors section starts on a cache line and the labels section on an
//! 8-byte boundary, so both can be viewed in place from a memory map.

use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use thiserror::Error;

use crate::hnsw::Graph;

/// Magic bytes identifying an index file: "ANNIDX01"
pub const MAGIC: [u8; 8] = *b"ANNIDX01";

/// Current format version
pub const VERSION: u32 = 1;

/// Header size in bytes
pub const HEADER_SIZE: usize = 64;

/// Header flags
pub mod flags {
    /// A pre-built HNSW graph follows the labels section
    pub const HAS_GRAPH: u32 = 1 << 0;
}

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("Invalid magic bytes: expected ANNIDX01")]
    InvalidMagic,

    #[error("Unsupported format version: {0}")]
    UnsupportedVersion(u32),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("File truncated: expected at least {expected} bytes, got {actual}")]
    Truncated { expected: u64, actual: u64 },

    #[error("Section {section} is not aligned for in-place access")]
    Misaligned { section: &'static str },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Corrupt graph section: {0}")]
    CorruptGraph(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Parsed index file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexHeader {
    pub version: u32,
    pub flags: u32,
    pub count: u64,
    pub dimensions: u32,
    pub ef_search: u32,
    pub vectors_offset: u64,
    pub labels_offset: u64,
    pub graph_offset: u64,
}

impl IndexHeader {
    /// Header for `count` vectors of `dimensions` components with no graph.
    pub fn new(count: u64, dimensions: u32) -> Result<Self, FormatError> {
        let vectors_len = count
            .checked_mul(dimensions as u64)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| FormatError::InvalidHeader("vectors section overflows".into()))?;

        Ok(Self {
            version: VERSION,
            flags: 0,
            count,
            dimensions,
            ef_search: 0,
            vectors_offset: HEADER_SIZE as u64,
            labels_offset: align_up(HEADER_SIZE as u64 + vectors_len, 8),
            graph_offset: 0,
        })
    }

    /// Parse header from the first 64 bytes of a file
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() < HEADER_SIZE {
            return Err(FormatError::Truncated {
                expected: HEADER_SIZE as u64,
                actual: bytes.len() as u64,
            });
        }

        if bytes[0..8] != MAGIC {
            return Err(FormatError::InvalidMagic);
        }

        let version = read_u32(bytes, 0x08);
        if version != VERSION {
            return Err(FormatError::UnsupportedVersion(version));
        }

        let header = Self {
            version,
            flags: read_u32(bytes, 0x0C),
            count: read_u64(bytes, 0x10),
            dimensions: read_u32(bytes, 0x18),
            ef_search: read_u32(bytes, 0x1C),
            vectors_offset: read_u64(bytes, 0x20),
            labels_offset: read_u64(bytes, 0x28),
            graph_offset: read_u64(bytes, 0x30),
        };

        if header.dimensions == 0 {
            return Err(FormatError::InvalidHeader("dimensions must be > 0".into()));
        }
        // Rows are addressed by u32 ids, like graph nodes
        if header.count > u32::MAX as u64 {
            return Err(FormatError::InvalidHeader(format!(
                "{} vectors exceed the u32 row id space",
                header.count
            )));
        }
        if header.vectors_offset != HEADER_SIZE as u64 {
            return Err(FormatError::Misaligned { section: "vectors" });
        }
        if header.labels_offset % 8 != 0 {
            return Err(FormatError::Misaligned { section: "labels" });
        }

        let vectors_end = header.vectors_end()?;
        if header.labels_offset < vectors_end {
            return Err(FormatError::InvalidHeader(
                "labels section overlaps vectors".into(),
            ));
        }
        let labels_end = header.labels_end()?;
        if header.has_graph() && header.graph_offset < labels_end {
            return Err(FormatError::InvalidHeader(
                "graph section overlaps labels".into(),
            ));
        }

        Ok(header)
    }

    /// Write header to bytes
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..8].copy_from_slice(&MAGIC);
        buf[0x08..0x0C].copy_from_slice(&self.version.to_le_bytes());
        buf[0x0C..0x10].copy_from_slice(&self.flags.to_le_bytes());
        buf[0x10..0x18].copy_from_slice(&self.count.to_le_bytes());
        buf[0x18..0x1C].copy_from_slice(&self.dimensions.to_le_bytes());
        buf[0x1C..0x20].copy_from_slice(&self.ef_search.to_le_bytes());
        buf[0x20..0x28].copy_from_slice(&self.vectors_offset.to_le_bytes());
        buf[0x28..0x30].copy_from_slice(&self.labels_offset.to_le_bytes());
        buf[0x30..0x38].copy_from_slice(&self.graph_offset.to_le_bytes());
        buf
    }

    #[inline]
    pub fn has_graph(&self) -> bool {
        self.flags & flags::HAS_GRAPH != 0
    }

    /// End offset (exclusive) of the vectors section
    pub fn vectors_end(&self) -> Result<u64, FormatError> {
        self.count
            .checked_mul(self.dimensions as u64)
            .and_then(|n| n.checked_mul(4))
            .and_then(|n| n.checked_add(self.vectors_offset))
            .ok_or_else(|| FormatError::InvalidHeader("vectors section overflows".into()))
    }

    /// End offset (exclusive) of the labels section
    pub fn labels_end(&self) -> Result<u64, FormatError> {
        self.count
            .checked_mul(8)
            .and_then(|n| n.checked_add(self.labels_offset))
            .ok_or_else(|| FormatError::InvalidHeader("labels section overflows".into()))
    }
}

#[inline]
fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(raw)
}

#[inline]
fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(raw)
}

#[inline]
fn align_up(offset: u64, alignment: u64) -> u64 {
    offset.div_ceil(alignment) * alignment
}

/// Writer for materializing index files
///
/// Vectors are streamed to disk as they are added; labels are buffered and
/// written after the vectors, followed by the optional graph.
///
/// ```ignore
/// let mut writer = IndexWriter::new("items.idx", 128)?;
/// writer.add(1001, &embedding)?;
/// writer.finish()?;
/// ```
pub struct IndexWriter {
    writer: BufWriter<File>,
    dimensions: usize,
    labels: Vec<i64>,
    graph: Option<(Graph, u32)>,
}

impl IndexWriter {
    pub fn new<P: AsRef<Path>>(path: P, dimensions: usize) -> Result<Self, FormatError> {
        if dimensions == 0 || dimensions > u32::MAX as usize {
            return Err(FormatError::InvalidHeader(format!(
                "unsupported dimension {}",
                dimensions
            )));
        }

        let mut writer = BufWriter::new(File::create(path)?);
        // Placeholder, rewritten by finish()
        writer.write_all(&[0u8; HEADER_SIZE])?;

        Ok(Self {
            writer,
            dimensions,
            labels: Vec::new(),
            graph: None,
        })
    }

    /// Append one vector with its external label
    pub fn add(&mut self, label: i64, vector: &[f32]) -> Result<(), FormatError> {
        if vector.len() != self.dimensions {
            return Err(FormatError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }

        for &val in vector {
            self.writer.write_all(&val.to_le_bytes())?;
        }
        self.labels.push(label);
        Ok(())
    }

    /// Attach a pre-built graph over the added vectors (node `i` = vector `i`)
    pub fn set_graph(&mut self, graph: Graph, ef_search: u32) {
        self.graph = Some((graph, ef_search));
    }

    /// Write labels and graph, then the final header
    pub fn finish(mut self) -> Result<IndexHeader, FormatError> {
        let mut header = IndexHeader::new(self.labels.len() as u64, self.dimensions as u32)?;

        let padding = header.labels_offset - header.vectors_end()?;
        self.writer.write_all(&vec![0u8; padding as usize])?;
        for label in &self.labels {
            self.writer.write_all(&label.to_le_bytes())?;
        }

        if let Some((graph, ef_search)) = &self.graph {
            graph.validate(self.labels.len())?;
            header.flags |= flags::HAS_GRAPH;
            header.ef_search = *ef_search;
            header.graph_offset = header.labels_end()?;
            graph.serialize(&mut self.writer)?;
        }

        self.writer.flush()?;
        let file = self.writer.get_mut();
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&header.to_bytes())?;
        file.sync_all()?;

        Ok(header)
    }
}
