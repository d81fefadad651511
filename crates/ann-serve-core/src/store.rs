//! Memory-mapped vector store
//!
//! Zero-copy access to the vectors and labels sections of an index file.
//! Both sections are cast in place with `bytemuck`; alignment is checked once
//! when the file is opened.

use std::fs::File;
use std::ops::Range;
use std::path::Path;

use memmap2::Mmap;

use crate::format::{FormatError, IndexHeader, HEADER_SIZE};

/// Read-only view over an index file's vectors and id map
pub struct VectorStore {
    mmap: Mmap,
    header: IndexHeader,
    vectors: Range<usize>,
    labels: Range<usize>,
    /// Number of vectors in the store
    pub count: usize,
    /// Dimensionality of each vector
    pub dim: usize,
}

impl VectorStore {
    /// Open an index file read-only.
    ///
    /// # Safety
    ///
    /// The file is memory mapped. It must not be truncated or rewritten while
    /// the store is alive.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FormatError> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        let header = IndexHeader::from_bytes(&mmap[..HEADER_SIZE.min(mmap.len())])?;

        let labels_end = header.labels_end()?;
        if (mmap.len() as u64) < labels_end {
            return Err(FormatError::Truncated {
                expected: labels_end,
                actual: mmap.len() as u64,
            });
        }

        let vectors = header.vectors_offset as usize..header.vectors_end()? as usize;
        let labels = header.labels_offset as usize..labels_end as usize;

        bytemuck::try_cast_slice::<u8, f32>(&mmap[vectors.clone()])
            .map_err(|_| FormatError::Misaligned { section: "vectors" })?;
        bytemuck::try_cast_slice::<u8, i64>(&mmap[labels.clone()])
            .map_err(|_| FormatError::Misaligned { section: "labels" })?;

        Ok(Self {
            count: header.count as usize,
            dim: header.dimensions as usize,
            mmap,
            header,
            vectors,
            labels,
        })
    }

    pub fn header(&self) -> &IndexHeader {
        &self.header
    }

    /// All vectors, row-major
    #[inline]
    pub fn vectors(&self) -> &[f32] {
        bytemuck::cast_slice(&self.mmap[self.vectors.clone()])
    }

    /// External label of every vector, by row
    #[inline]
    pub fn labels(&self) -> &[i64] {
        bytemuck::cast_slice(&self.mmap[self.labels.clone()])
    }

    /// Vector at row `index`, `None` when out of bounds
    #[inline]
    pub fn get(&self, index: usize) -> Option<&[f32]> {
        if index >= self.count {
            return None;
        }
        let start = index * self.dim;
        Some(&self.vectors()[start..start + self.dim])
    }

    /// Bytes following the labels section (the graph, when present)
    pub fn trailing_section(&self, offset: u64) -> Result<&[u8], FormatError> {
        let start = offset as usize;
        if start > self.mmap.len() {
            return Err(FormatError::Truncated {
                expected: offset,
                actual: self.mmap.len() as u64,
            });
        }
        Ok(&self.mmap[start..])
    }

    /// Size of the mapped file
    pub fn memory_bytes(&self) -> usize {
        self.mmap.len()
    }
}
