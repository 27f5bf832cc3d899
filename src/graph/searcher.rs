//! Greedy best-first graph traversal with a resumable frontier.

use std::collections::BinaryHeap;

use crate::bits::{Bits, FixedBitSet};
use crate::error::{IndexError, Result};
use crate::graph::GraphIndex;
use crate::queue::{BoundedNodeQueue, NodeScore};
use crate::similarity::VectorSimilarity;
use crate::store::VectorStore;

/// Outcome of one search (or resume) phase.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Accepted nodes, score descending, ties toward the lower ordinal.
    pub nodes: Vec<NodeScore>,
    /// Nodes scored during this phase.
    pub visited_count: usize,
}

/// Stateful best-first searcher over a graph view.
///
/// The searcher is an explicit object rather than an iterator: callers
/// drive it synchronously with [`search`](Self::search) and then
/// [`resume`](Self::resume), and the retained state (frontier, visited set,
/// evicted results) is what makes `search(k)` + `resume(k')` equivalent to
/// `search(k + k')`.
///
/// A searcher snapshots the graph's entry point and node count when a
/// search starts; nodes inserted concurrently after that point are ignored
/// for the remainder of the search.
pub struct GraphSearcher<'a, G: GraphIndex + ?Sized> {
    graph: &'a G,
    candidates: BinaryHeap<NodeScore>,
    visited: FixedBitSet,
    /// Scored-and-accepted entries displaced from a phase's bounded result
    /// queue; re-offered to the frontier on resume.
    evicted: Vec<NodeScore>,
    /// Every node scored since the last reset, in scoring order.
    scored: Vec<NodeScore>,
    score: Option<Box<dyn Fn(u32) -> f32 + Send + 'a>>,
    accept: Bits,
    phase_visited: usize,
}

impl<'a, G: GraphIndex + ?Sized> GraphSearcher<'a, G> {
    pub fn new(graph: &'a G) -> Self {
        Self {
            graph,
            candidates: BinaryHeap::new(),
            visited: FixedBitSet::new(0),
            evicted: Vec::new(),
            scored: Vec::new(),
            score: None,
            accept: Bits::All,
            phase_visited: 0,
        }
    }

    /// Run a fresh search for the `top_k` best accepted nodes.
    ///
    /// `score` must be deterministic for the lifetime of this search and
    /// any subsequent [`resume`](Self::resume) calls. An empty graph yields
    /// an empty result.
    pub fn search<S>(&mut self, score: S, top_k: usize, accept: Bits) -> Result<SearchResult>
    where
        S: Fn(u32) -> f32 + Send + 'a,
    {
        self.search_with_seeds(score, top_k, accept, &[])
    }

    /// [`search`](Self::search), additionally seeding the frontier with the
    /// given ordinals alongside the entry point.
    pub fn search_with_seeds<S>(
        &mut self,
        score: S,
        top_k: usize,
        accept: Bits,
        seeds: &[u32],
    ) -> Result<SearchResult>
    where
        S: Fn(u32) -> f32 + Send + 'a,
    {
        if top_k == 0 {
            return Err(IndexError::InvalidParameter(
                "top_k must be greater than 0".to_string(),
            ));
        }
        self.candidates.clear();
        self.evicted.clear();
        self.scored.clear();
        self.visited = FixedBitSet::new(self.graph.size());
        self.score = Some(Box::new(score));
        self.accept = accept;

        for &seed in self.graph.entry_point().iter().chain(seeds) {
            if (seed as usize) >= self.visited.capacity() || self.visited.get(seed as usize) {
                continue;
            }
            let s = self.score_node(seed)?;
            self.candidates.push(NodeScore::new(seed, s));
        }
        self.phase(top_k)
    }

    /// Continue a prior search, returning up to `additional_k` further
    /// results beyond those already returned.
    pub fn resume(&mut self, additional_k: usize) -> Result<SearchResult> {
        if self.score.is_none() {
            return Err(IndexError::InvalidParameter(
                "resume called before search".to_string(),
            ));
        }
        if additional_k == 0 {
            return Err(IndexError::InvalidParameter(
                "additional_k must be greater than 0".to_string(),
            ));
        }
        self.phase(additional_k)
    }

    /// Approximate search followed by exact re-ranking.
    ///
    /// Expands an over-sized candidate pool of `top_k * rerank_factor`
    /// under the cheap `approx` function, rescores that pool with `exact`,
    /// and returns the true top `top_k`.
    pub fn search_reranked<S, R>(
        &mut self,
        approx: S,
        exact: R,
        top_k: usize,
        rerank_factor: usize,
        accept: Bits,
    ) -> Result<SearchResult>
    where
        S: Fn(u32) -> f32 + Send + 'a,
        R: Fn(u32) -> f32,
    {
        if rerank_factor == 0 {
            return Err(IndexError::InvalidParameter(
                "rerank_factor must be greater than 0".to_string(),
            ));
        }
        let expanded = self.search(approx, top_k * rerank_factor, accept)?;
        let mut rescored = Vec::with_capacity(expanded.nodes.len());
        for entry in &expanded.nodes {
            let s = exact(entry.node);
            debug_assert!(s.is_finite(), "non-finite rerank score");
            if !s.is_finite() {
                return Err(IndexError::NonFiniteScore { node: entry.node });
            }
            rescored.push(NodeScore::new(entry.node, s));
        }
        rescored.sort_by(|a, b| b.cmp(a));
        rescored.truncate(top_k);
        Ok(SearchResult {
            nodes: rescored,
            visited_count: expanded.visited_count,
        })
    }

    /// All nodes scored since the last [`search`](Self::search), in scoring
    /// order. The builder feeds this full visited set into edge selection.
    pub fn visited_scored(&self) -> &[NodeScore] {
        &self.scored
    }

    fn phase(&mut self, top_k: usize) -> Result<SearchResult> {
        self.phase_visited = 0;
        let mut results = BoundedNodeQueue::new(top_k);

        // Results displaced in an earlier phase are still the best known
        // unreturned nodes; put them back in contention.
        for entry in std::mem::take(&mut self.evicted) {
            self.candidates.push(entry);
        }

        while let Some(best) = self.candidates.peek().copied() {
            if results.is_full()
                && results.worst_score().is_some_and(|worst| best.score < worst)
            {
                break;
            }
            self.candidates.pop();

            if self.accept.contains(best.node) {
                if let Some(displaced) = results.push(best) {
                    self.evicted.push(displaced);
                }
            }

            for n in self.graph.neighbors(best.node)? {
                if (n as usize) >= self.visited.capacity() || self.visited.get(n as usize) {
                    continue;
                }
                let s = self.score_node(n)?;
                self.candidates.push(NodeScore::new(n, s));
            }
        }

        Ok(SearchResult {
            nodes: results.into_sorted_vec(),
            visited_count: self.phase_visited,
        })
    }

    fn score_node(&mut self, node: u32) -> Result<f32> {
        self.visited.set(node as usize);
        self.phase_visited += 1;
        let score_fn = self.score.as_ref().expect("score function is set");
        let s = score_fn(node);
        debug_assert!(s.is_finite(), "non-finite similarity for node {node}");
        if !s.is_finite() {
            return Err(IndexError::NonFiniteScore { node });
        }
        self.scored.push(NodeScore::new(node, s));
        Ok(s)
    }
}

/// One-shot exact search: top `top_k` nodes for `query` under `similarity`.
///
/// Checks the query dimension against the store and scores nodes with the
/// exact similarity function.
pub fn search<G, V>(
    query: &[f32],
    top_k: usize,
    store: &V,
    similarity: VectorSimilarity,
    graph: &G,
    accept: Bits,
) -> Result<SearchResult>
where
    G: GraphIndex + ?Sized,
    V: VectorStore + ?Sized,
{
    if query.len() != store.dimension() {
        return Err(IndexError::DimensionMismatch {
            expected: store.dimension(),
            actual: query.len(),
        });
    }
    let mut searcher = GraphSearcher::new(graph);
    searcher.search(
        |i| similarity.compare(query, &store.vector(i)),
        top_k,
        accept,
    )
}
