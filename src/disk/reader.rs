//! Memory-mapped graph reader.

use std::borrow::Cow;
use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::disk::{HEADER_LEN, UNUSED, record_len};
use crate::error::{IndexError, Result};
use crate::graph::{GraphIndex, NeighborList};
use crate::store::VectorStore;

/// Read-only graph backed by a memory-mapped index file.
///
/// Serves both traversal (`GraphIndex`) and vector access (`VectorStore`):
/// the format inlines vectors, so one file is the whole index. Vectors come
/// back `Cow::Owned` because records are big-endian on disk; retaining one
/// never aliases the map.
pub struct OnDiskGraph {
    mmap: Mmap,
    size: usize,
    dimension: usize,
    max_degree: usize,
    entry: Option<u32>,
    record_len: usize,
}

impl OnDiskGraph {
    /// Map `path` and validate its header against the file length.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        // Safety: the map is read-only and the file is treated as immutable
        // once written; concurrent truncation is outside the supported use.
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() < HEADER_LEN {
            return Err(IndexError::Corrupt(format!(
                "file is {} bytes, shorter than the header",
                mmap.len()
            )));
        }

        let header: &[u8] = &mmap;
        let size = read_i32(header, 0);
        let dimension = read_i32(header, 4);
        let entry = read_i32(header, 8);
        let max_degree = read_i32(header, 12);

        if size < 0 || dimension <= 0 || max_degree <= 0 {
            return Err(IndexError::Corrupt(format!(
                "invalid header: size={size} dimension={dimension} max_degree={max_degree}"
            )));
        }
        let size = size as usize;
        let dimension = dimension as usize;
        let max_degree = max_degree as usize;

        let entry = match entry {
            UNUSED => None,
            e if e >= 0 && (e as usize) < size => Some(e as u32),
            e => {
                return Err(IndexError::Corrupt(format!(
                    "entry point {e} outside graph of size {size}"
                )));
            }
        };

        let record_len = record_len(dimension, max_degree);
        let expected = HEADER_LEN + size * record_len;
        if mmap.len() != expected {
            return Err(IndexError::Corrupt(format!(
                "file is {} bytes, expected {expected} for {size} nodes",
                mmap.len()
            )));
        }

        Ok(Self {
            mmap,
            size,
            dimension,
            max_degree,
            entry,
            record_len,
        })
    }

    #[inline]
    fn record(&self, node: u32) -> &[u8] {
        let start = HEADER_LEN + node as usize * self.record_len;
        &self.mmap[start..start + self.record_len]
    }
}

fn read_i32(bytes: &[u8], offset: usize) -> i32 {
    i32::from_be_bytes(bytes[offset..offset + 4].try_into().expect("4 bytes"))
}

fn read_f32(bytes: &[u8], offset: usize) -> f32 {
    f32::from_be_bytes(bytes[offset..offset + 4].try_into().expect("4 bytes"))
}

impl GraphIndex for OnDiskGraph {
    fn size(&self) -> usize {
        self.size
    }

    fn max_degree(&self) -> usize {
        self.max_degree
    }

    fn entry_point(&self) -> Option<u32> {
        self.entry
    }

    fn neighbors(&self, node: u32) -> Result<NeighborList> {
        if node as usize >= self.size {
            return Err(IndexError::InvalidParameter(format!(
                "node {node} outside graph of size {}",
                self.size
            )));
        }
        let record = self.record(node);
        let count = read_i32(record, self.dimension * 4);
        if count < 0 || count as usize > self.max_degree {
            return Err(IndexError::Corrupt(format!(
                "node {node} has neighbor count {count} (max degree {})",
                self.max_degree
            )));
        }

        let mut neighbors = NeighborList::with_capacity(count as usize);
        let base = self.dimension * 4 + 4;
        for slot in 0..count as usize {
            let target = read_i32(record, base + slot * 4);
            if target < 0 || target as usize >= self.size {
                return Err(IndexError::Corrupt(format!(
                    "node {node} has edge target {target} outside graph of size {}",
                    self.size
                )));
            }
            neighbors.push(target as u32);
        }
        Ok(neighbors)
    }
}

impl VectorStore for OnDiskGraph {
    fn len(&self) -> usize {
        self.size
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn vector(&self, ordinal: u32) -> Cow<'_, [f32]> {
        assert!(
            (ordinal as usize) < self.size,
            "ordinal {ordinal} outside graph of size {}",
            self.size
        );
        let record = self.record(ordinal);
        let mut v = Vec::with_capacity(self.dimension);
        for d in 0..self.dimension {
            v.push(read_f32(record, d * 4));
        }
        Cow::Owned(v)
    }
}
