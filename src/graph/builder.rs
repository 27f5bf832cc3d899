//! Incremental concurrent graph construction (Vamana-style).
//!
//! Each insert searches the graph as it exists, diversifies the visited set
//! into the new node's outgoing edges, then installs back-edges on every
//! chosen neighbor. Two concurrent inserts may each miss the other's edges
//! mid-flight; the back-edge pass is what guarantees that if `j` belongs in
//! `i`'s neighborhood, either `i`'s search finds it or `j`'s back-edge
//! installs the reverse link, symmetrized at the next diversity pass.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::bits::Bits;
use crate::error::{IndexError, Result};
use crate::graph::searcher::GraphSearcher;
use crate::graph::{GraphIndex, OnHeapGraph};
use crate::queue::NodeScore;
use crate::similarity::VectorSimilarity;
use crate::simd;
use crate::store::VectorStore;

/// Construction parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GraphBuilderConfig {
    /// Maximum neighbors per node (M / R in the literature).
    pub max_degree: usize,
    /// Search width during construction (ef / L).
    pub beam_width: usize,
    /// Diversity relaxation, `>= 1`. 1.0 is the strict rule; 1.2-1.4 keeps
    /// more long-range edges.
    pub alpha: f32,
    /// Factor over `max_degree` tolerated on back-edge targets before a
    /// forced diversity pass, `>= 1`.
    pub neighbor_overflow: f32,
}

impl Default for GraphBuilderConfig {
    fn default() -> Self {
        Self {
            max_degree: 32,
            beam_width: 100,
            alpha: 1.2,
            neighbor_overflow: 1.2,
        }
    }
}

impl GraphBuilderConfig {
    fn validate(&self) -> Result<()> {
        if self.max_degree == 0 {
            return Err(IndexError::InvalidParameter(
                "max_degree must be greater than 0".to_string(),
            ));
        }
        if self.beam_width == 0 {
            return Err(IndexError::InvalidParameter(
                "beam_width must be greater than 0".to_string(),
            ));
        }
        if !self.alpha.is_finite() || self.alpha < 1.0 {
            return Err(IndexError::InvalidParameter(format!(
                "alpha must be >= 1.0, got {}",
                self.alpha
            )));
        }
        if !self.neighbor_overflow.is_finite() || self.neighbor_overflow < 1.0 {
            return Err(IndexError::InvalidParameter(format!(
                "neighbor_overflow must be >= 1.0, got {}",
                self.neighbor_overflow
            )));
        }
        Ok(())
    }
}

/// Builds an [`OnHeapGraph`] over a vector store.
///
/// [`insert`](Self::insert) takes `&self` and is safe to call from many
/// threads; [`build`](Self::build) drives one insert per store ordinal
/// across the rayon pool and finishes the graph.
pub struct GraphBuilder<'a, S: VectorStore> {
    store: &'a S,
    similarity: VectorSimilarity,
    config: GraphBuilderConfig,
    graph: OnHeapGraph,
    /// Graph size at which the entry point is recomputed next (every 2x
    /// growth; the centroid scan is O(n), so refreshes cost O(n) amortized).
    refresh_at: AtomicUsize,
    refresh_lock: Mutex<()>,
}

impl<'a, S: VectorStore> GraphBuilder<'a, S> {
    pub fn new(
        store: &'a S,
        similarity: VectorSimilarity,
        config: GraphBuilderConfig,
    ) -> Result<Self> {
        config.validate()?;
        if store.is_empty() {
            return Err(IndexError::EmptyIndex);
        }
        Ok(Self {
            store,
            similarity,
            config,
            graph: OnHeapGraph::new(config.max_degree, config.neighbor_overflow),
            refresh_at: AtomicUsize::new(2),
            refresh_lock: Mutex::new(()),
        })
    }

    /// The graph under construction.
    pub fn graph(&self) -> &OnHeapGraph {
        &self.graph
    }

    /// Insert store ordinal `node` into the graph.
    pub fn insert(&self, node: u32) -> Result<()> {
        if node as usize >= self.store.len() {
            return Err(IndexError::InvalidParameter(format!(
                "ordinal {node} is outside the store (size {})",
                self.store.len()
            )));
        }

        let set = self.graph.ensure_node(node);
        if self.graph.try_set_entry(node) {
            // First node: nothing to link against.
            return Ok(());
        }

        // Candidate search over the graph as it currently exists, keeping
        // the full scored visited set rather than just the top beam_width.
        let query = self.store.vector(node);
        let query = query.as_ref();
        let mut searcher = GraphSearcher::new(&self.graph);
        searcher.search(
            |i| self.similarity.compare(query, &self.store.vector(i)),
            self.config.beam_width,
            Bits::All,
        )?;
        let mut candidates: Vec<NodeScore> = searcher.visited_scored().to_vec();
        candidates.retain(|c| c.node != node);
        if candidates.is_empty() {
            // Concurrent window where the search saw nothing but ourselves
            // (e.g. the entry point moved onto this node mid-insert); link
            // to the entry so the node is never isolated.
            if let Some(e) = self.graph.entry_point() {
                if e != node {
                    candidates.push(NodeScore::new(e, self.score_pair(node, e)));
                }
            }
        }

        let scorer = |a: u32, b: u32| self.score_pair(a, b);
        set.insert_diverse(candidates, self.config.alpha, &scorer);

        // Back-edges: every chosen neighbor learns about the new node, with
        // a diversity pass once its set outgrows the overflow allowance.
        let overflow_limit = self.config.max_degree as f32 * self.config.neighbor_overflow;
        for j in set.ids() {
            let Some(jset) = self.graph.node(j) else { continue };
            let score = self.score_pair(j, node);
            let len = jset.insert_not_diverse(node, score);
            if len as f32 > overflow_limit {
                jset.cleanup(self.config.alpha, &scorer);
            }
        }

        self.maybe_refresh_entry();
        Ok(())
    }

    /// Insert every store ordinal in parallel and finish the graph.
    pub fn build(self) -> Result<OnHeapGraph> {
        let n = self.store.len() as u32;
        (0..n).into_par_iter().try_for_each(|i| self.insert(i))?;
        self.finish()
    }

    /// Final pass: re-prune any node over its degree cap, refresh the entry
    /// point, and release the graph.
    pub fn finish(self) -> Result<OnHeapGraph> {
        let scorer = |a: u32, b: u32| self.score_pair(a, b);
        for set in self.graph.nodes_snapshot() {
            set.enforce_degree(self.config.alpha, &scorer);
        }
        self.refresh_entry();
        Ok(self.graph)
    }

    /// Re-select the entry point as the node closest to the centroid of all
    /// inserted vectors, ties toward the lower ordinal.
    pub fn refresh_entry(&self) {
        let size = self.graph.size();
        if size == 0 {
            return;
        }
        let dim = self.store.dimension();
        let mut centroid = vec![0.0f32; dim];
        for i in 0..size {
            simd::add_in_place(&mut centroid, &self.store.vector(i as u32));
        }
        simd::scale(&mut centroid, 1.0 / size as f32);

        let mut best = 0u32;
        let mut best_score = f32::NEG_INFINITY;
        for i in 0..size {
            let s = self.similarity.compare(&centroid, &self.store.vector(i as u32));
            if s > best_score {
                best_score = s;
                best = i as u32;
            }
        }
        self.graph.set_entry(best);
    }

    fn maybe_refresh_entry(&self) {
        let size = self.graph.size();
        if size >= self.refresh_at.load(Ordering::Relaxed) {
            // Lazy cadence: whoever crosses the threshold first refreshes;
            // concurrent inserters skip rather than queue up.
            if let Some(_guard) = self.refresh_lock.try_lock() {
                self.refresh_entry();
                self.refresh_at.store(size.saturating_mul(2), Ordering::Relaxed);
            }
        }
    }

    #[inline]
    fn score_pair(&self, a: u32, b: u32) -> f32 {
        self.similarity
            .compare(&self.store.vector(a), &self.store.vector(b))
    }
}
