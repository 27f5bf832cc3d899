//! LRU cache of warm graph nodes over a cold backing graph.

use std::borrow::Cow;
use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::error::Result;
use crate::graph::{GraphIndex, NeighborList};
use crate::store::VectorStore;

/// Materialized node: its vector and outgoing edges together, since a
/// traversal that touches a node always wants both.
#[derive(Clone)]
struct CachedNode {
    vector: Vec<f32>,
    neighbors: NeighborList,
}

/// One lock over both the map and the recency queue; split locks invite
/// lookup/eviction races on the same ordinal.
struct CacheState {
    nodes: HashMap<u32, CachedNode>,
    recency: VecDeque<u32>,
}

/// LRU wrapper that keeps recently traversed nodes of a cold (typically
/// memory-mapped) graph materialized on the heap.
///
/// Construction prewarms the first two BFS layers from the entry point so
/// the entry neighborhood every search crosses is always hot. A node that
/// fails to load is surfaced as an error and never populates the cache.
pub struct CachingGraph<G: GraphIndex + VectorStore> {
    inner: G,
    capacity: usize,
    state: Mutex<CacheState>,
}

impl<G: GraphIndex + VectorStore> CachingGraph<G> {
    /// Wrap `inner` with room for `capacity` materialized nodes.
    pub fn new(inner: G, capacity: usize) -> Result<Self> {
        let cache = Self {
            inner,
            capacity: capacity.max(1),
            state: Mutex::new(CacheState {
                nodes: HashMap::new(),
                recency: VecDeque::new(),
            }),
        };
        cache.prewarm()?;
        Ok(cache)
    }

    /// Wrap `inner` with the default capacity: the entry point plus two
    /// full BFS layers at the graph's degree cap, bounded at 10k nodes.
    pub fn with_default_capacity(inner: G) -> Result<Self> {
        let d = inner.max_degree();
        let capacity = (1 + d + d * d).min(10_000);
        Self::new(inner, capacity)
    }

    /// The wrapped graph.
    pub fn inner(&self) -> &G {
        &self.inner
    }

    /// Materialized node count.
    pub fn cached_nodes(&self) -> usize {
        self.state.lock().nodes.len()
    }

    fn prewarm(&self) -> Result<()> {
        let Some(entry) = self.inner.entry_point() else {
            return Ok(());
        };
        let mut frontier = vec![entry];
        let mut seen = std::collections::HashSet::new();
        seen.insert(entry);
        for _layer in 0..2 {
            let mut next = Vec::new();
            for node in frontier {
                if self.cached_nodes() >= self.capacity {
                    return Ok(());
                }
                let cached = self.load(node)?;
                for n in cached.neighbors {
                    if seen.insert(n) {
                        next.push(n);
                    }
                }
            }
            frontier = next;
        }
        for node in frontier {
            if self.cached_nodes() >= self.capacity {
                break;
            }
            self.load(node)?;
        }
        Ok(())
    }

    /// Fetch `node` through the cache, reading the backing graph on a miss.
    fn load(&self, node: u32) -> Result<CachedNode> {
        {
            let mut state = self.state.lock();
            if let Some(cached) = state.nodes.get(&node) {
                let cached = cached.clone();
                // Refresh recency.
                if let Some(pos) = state.recency.iter().position(|&n| n == node) {
                    state.recency.remove(pos);
                }
                state.recency.push_back(node);
                return Ok(cached);
            }
        }

        // Miss: read cold storage without holding the lock.
        let neighbors = self.inner.neighbors(node)?;
        let vector = self.inner.vector(node).into_owned();
        let cached = CachedNode { vector, neighbors };

        let mut state = self.state.lock();
        if !state.nodes.contains_key(&node) {
            state.nodes.insert(node, cached.clone());
            state.recency.push_back(node);
            while state.nodes.len() > self.capacity {
                if let Some(oldest) = state.recency.pop_front() {
                    state.nodes.remove(&oldest);
                } else {
                    break;
                }
            }
        }
        Ok(cached)
    }
}

impl<G: GraphIndex + VectorStore> GraphIndex for CachingGraph<G> {
    fn size(&self) -> usize {
        GraphIndex::size(&self.inner)
    }

    fn max_degree(&self) -> usize {
        self.inner.max_degree()
    }

    fn entry_point(&self) -> Option<u32> {
        self.inner.entry_point()
    }

    fn neighbors(&self, node: u32) -> Result<NeighborList> {
        Ok(self.load(node)?.neighbors)
    }
}

impl<G: GraphIndex + VectorStore> VectorStore for CachingGraph<G> {
    fn len(&self) -> usize {
        VectorStore::len(&self.inner)
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn vector(&self, ordinal: u32) -> Cow<'_, [f32]> {
        match self.load(ordinal) {
            Ok(cached) => Cow::Owned(cached.vector),
            // A node whose record is unreadable still has a readable vector
            // region; the corruption surfaces on the neighbors() path.
            Err(_) => self.inner.vector(ordinal),
        }
    }
}
