//! Navigable small-world graph: on-heap representation, builder, searcher.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;
use smallvec::SmallVec;

use crate::error::{IndexError, Result};

pub mod builder;
pub mod neighbors;
pub mod searcher;

pub use builder::{GraphBuilder, GraphBuilderConfig};
pub use neighbors::ConcurrentNeighborSet;
pub use searcher::{GraphSearcher, SearchResult, search};

/// Outgoing edges of one node, by ordinal.
///
/// Inline capacity sized for typical degree caps (M = 16..32).
pub type NeighborList = SmallVec<[u32; 32]>;

const NO_ENTRY: u32 = u32::MAX;

/// Read-only traversal interface shared by the on-heap graph, the on-disk
/// reader, and the caching wrapper.
pub trait GraphIndex: Send + Sync {
    /// Number of nodes. Ordinals are dense in `0..size`.
    fn size(&self) -> usize;

    /// Degree cap the graph was built with.
    fn max_degree(&self) -> usize;

    /// Starting node for traversals, `None` while the graph is empty.
    fn entry_point(&self) -> Option<u32>;

    /// Outgoing edges of `node`.
    fn neighbors(&self, node: u32) -> Result<NeighborList>;
}

/// Graph of nodes with concurrent neighbor sets, grown by the builder.
///
/// Node expansion is guarded by a single writer lock; each node's edges are
/// independently synchronized inside its [`ConcurrentNeighborSet`]. The
/// entry point is a lone atomic, read unsynchronized. Once the builder
/// releases the graph it is read-only.
pub struct OnHeapGraph {
    nodes: RwLock<Vec<Arc<ConcurrentNeighborSet>>>,
    entry: AtomicU32,
    max_degree: usize,
    neighbor_overflow: f32,
}

impl OnHeapGraph {
    pub(crate) fn new(max_degree: usize, neighbor_overflow: f32) -> Self {
        Self {
            nodes: RwLock::new(Vec::new()),
            entry: AtomicU32::new(NO_ENTRY),
            max_degree,
            neighbor_overflow,
        }
    }

    /// Register `ordinal`, creating empty neighbor sets up to and including
    /// it, and return its set.
    pub(crate) fn ensure_node(&self, ordinal: u32) -> Arc<ConcurrentNeighborSet> {
        {
            let nodes = self.nodes.read();
            if let Some(set) = nodes.get(ordinal as usize) {
                return Arc::clone(set);
            }
        }
        let mut nodes = self.nodes.write();
        while nodes.len() <= ordinal as usize {
            let owner = nodes.len() as u32;
            nodes.push(Arc::new(ConcurrentNeighborSet::new(
                owner,
                self.max_degree,
                self.neighbor_overflow,
            )));
        }
        Arc::clone(&nodes[ordinal as usize])
    }

    /// The neighbor set of `ordinal`, if registered.
    pub(crate) fn node(&self, ordinal: u32) -> Option<Arc<ConcurrentNeighborSet>> {
        self.nodes.read().get(ordinal as usize).map(Arc::clone)
    }

    pub(crate) fn nodes_snapshot(&self) -> Vec<Arc<ConcurrentNeighborSet>> {
        self.nodes.read().clone()
    }

    /// Install `ordinal` as the entry point only if none is set yet.
    pub(crate) fn try_set_entry(&self, ordinal: u32) -> bool {
        self.entry
            .compare_exchange(NO_ENTRY, ordinal, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn set_entry(&self, ordinal: u32) {
        self.entry.store(ordinal, Ordering::Release);
    }
}

impl GraphIndex for OnHeapGraph {
    fn size(&self) -> usize {
        self.nodes.read().len()
    }

    fn max_degree(&self) -> usize {
        self.max_degree
    }

    fn entry_point(&self) -> Option<u32> {
        match self.entry.load(Ordering::Acquire) {
            NO_ENTRY => None,
            e => Some(e),
        }
    }

    fn neighbors(&self, node: u32) -> Result<NeighborList> {
        let set = self.node(node).ok_or_else(|| {
            IndexError::InvalidParameter(format!("node {node} is not in the graph"))
        })?;
        Ok(set.ids())
    }
}
