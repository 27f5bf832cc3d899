//! On-disk graph format, memory-mapped reader, and warm-node cache.
//!
//! # Wire format
//!
//! Big-endian regardless of host, no compression, no per-node offset table:
//!
//! ```text
//! HEADER: i32 size | i32 dimension | i32 entry_point (-1 = none) | i32 max_degree
//! NODES (repeating 0..size):
//!   f32[dimension] vector
//!   i32            neighbor_count
//!   i32[max_degree] neighbor ordinals, unused slots = -1
//! ```
//!
//! Every record has the same length, so node `i` starts at
//! `HEADER_LEN + i * record_len` and the reader does O(1) random access.

mod cache;
mod reader;
mod writer;

pub use cache::CachingGraph;
pub use reader::OnDiskGraph;
pub use writer::write_graph;

pub(crate) const HEADER_LEN: usize = 16;

/// Padding value for unused neighbor slots and the no-entry-point header.
pub(crate) const UNUSED: i32 = -1;

pub(crate) fn record_len(dimension: usize, max_degree: usize) -> usize {
    dimension * 4 + 4 + max_degree * 4
}
