//! proxima: approximate nearest neighbor search on a navigable small-world
//! graph (DiskANN/Vamana family), with a product-quantization side-index
//! for cheap approximate scoring plus exact re-ranking.
//!
//! # Anatomy
//!
//! | Piece | Module | Role |
//! |-------|--------|------|
//! | [`GraphBuilder`] | [`graph::builder`] | Concurrent incremental construction: search, RobustPrune, back-edges |
//! | [`GraphSearcher`] | [`graph::searcher`] | Resumable best-first traversal with acceptance filtering |
//! | [`ProductQuantizer`] / [`CompressedVectors`] | [`pq`] | Codebook training, encoding, asymmetric distance tables |
//! | [`OnDiskGraph`] / [`CachingGraph`] | [`disk`] | Big-endian serialized graph, mmap reader, LRU of warm nodes |
//!
//! # Usage
//!
//! ```
//! use proxima::{
//!     Bits, DenseVectorStore, GraphBuilder, GraphBuilderConfig, VectorSimilarity,
//! };
//!
//! let vectors: Vec<Vec<f32>> = (0..64)
//!     .map(|i| {
//!         let a = i as f32 * 0.05;
//!         vec![a.cos(), a.sin()]
//!     })
//!     .collect();
//! let store = DenseVectorStore::from_vectors(&vectors)?;
//!
//! let builder = GraphBuilder::new(
//!     &store,
//!     VectorSimilarity::DotProduct,
//!     GraphBuilderConfig::default(),
//! )?;
//! let graph = builder.build()?;
//!
//! let result = proxima::graph::search(
//!     &[1.0, 0.0],
//!     5,
//!     &store,
//!     VectorSimilarity::DotProduct,
//!     &graph,
//!     Bits::All,
//! )?;
//! assert_eq!(result.nodes[0].node, 0);
//! # Ok::<(), proxima::IndexError>(())
//! ```
//!
//! # Critical nuances
//!
//! - Every similarity is normalized so **higher is closer**; see
//!   [`VectorSimilarity`] for the exact formulas and the unit-length
//!   requirement on [`VectorSimilarity::DotProduct`].
//! - Search with the same similarity the graph was built with. The edge
//!   diversity argument (and the PQ re-ranking split) assumes build-time
//!   and query-time scores agree.
//! - The builder tolerates degree overshoot up to `neighbor_overflow`
//!   between diversity passes; degrees are within `max_degree` once
//!   [`GraphBuilder::build`] (or `finish`) returns, not mid-build.
//! - Graphs are read-only after the builder releases them; searchers are
//!   cheap per-query objects, safe to run concurrently over one graph.

pub mod bits;
pub mod disk;
pub mod error;
pub mod graph;
pub mod kmeans;
pub mod pq;
pub mod queue;
pub mod similarity;
pub mod simd;
pub mod store;

pub use bits::{Bits, FixedBitSet};
pub use disk::{CachingGraph, OnDiskGraph, write_graph};
pub use error::{IndexError, Result};
pub use graph::{
    GraphBuilder, GraphBuilderConfig, GraphIndex, GraphSearcher, OnHeapGraph, SearchResult,
};
pub use pq::{AdcTable, CompressedVectors, ProductQuantizer};
pub use queue::NodeScore;
pub use similarity::VectorSimilarity;
pub use store::{DenseVectorStore, VectorStore};
