//! Per-node concurrent neighbor sets with diversity-preserving insertion.
//!
//! # Diversity (RobustPrune)
//!
//! An edge `(owner -> c)` is redundant if some already-chosen neighbor `r`
//! is closer to `c` than the owner is: the greedy search can reach `c`
//! through `r`. `select_diverse` admits candidates best-first and keeps `c`
//! only while `alpha * sim(c, owner) > sim(c, r)` for every admitted `r`.
//! `alpha >= 1` relaxes the test; at `alpha = 1` an exact tie rejects the
//! newcomer, so the incumbent edge survives.
//!
//! # Concurrency
//!
//! Each set owns one lock over `{diverse, overflow}`. Back-edge writers
//! append to the overflow region; the next diversity pass merges it back.
//! Every mutation is serializable under the owner's lock and readers see
//! either the old or the new contents, never a partial merge.

use parking_lot::RwLock;

use crate::graph::NeighborList;
use crate::queue::NodeScore;

/// Scores the similarity between two node ordinals.
pub type PairScorer<'a> = dyn Fn(u32, u32) -> f32 + 'a;

/// Concurrent bag of outgoing edges for one node.
pub struct ConcurrentNeighborSet {
    owner: u32,
    max_degree: usize,
    hard_capacity: usize,
    state: RwLock<NeighborState>,
}

#[derive(Default)]
struct NeighborState {
    /// Last diversity-selected snapshot, at most `max_degree` entries.
    diverse: Vec<NodeScore>,
    /// Appends since the last diversity pass.
    overflow: Vec<NodeScore>,
}

impl NeighborState {
    fn len(&self) -> usize {
        self.diverse.len() + self.overflow.len()
    }

    fn contains(&self, node: u32) -> bool {
        self.diverse.iter().chain(self.overflow.iter()).any(|e| e.node == node)
    }

    fn merged(&self) -> Vec<NodeScore> {
        let mut all = Vec::with_capacity(self.len());
        all.extend_from_slice(&self.diverse);
        all.extend_from_slice(&self.overflow);
        all
    }
}

impl ConcurrentNeighborSet {
    /// New empty set for `owner` with degree cap `max_degree`.
    ///
    /// `neighbor_overflow >= 1` sizes the slack tolerated before callers
    /// re-diversify; the set itself only enforces a hard bound past which
    /// the lowest-scoring member is evicted.
    pub fn new(owner: u32, max_degree: usize, neighbor_overflow: f32) -> Self {
        let overflow_cap = (max_degree as f32 * neighbor_overflow).ceil() as usize;
        Self {
            owner,
            max_degree,
            hard_capacity: overflow_cap.max(2 * max_degree),
            state: RwLock::new(NeighborState::default()),
        }
    }

    /// The node this set belongs to.
    pub fn owner(&self) -> u32 {
        self.owner
    }

    /// Current edge count, overflow included.
    pub fn len(&self) -> usize {
        self.state.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of neighbor ordinals.
    pub fn ids(&self) -> NeighborList {
        let state = self.state.read();
        state.diverse.iter().chain(state.overflow.iter()).map(|e| e.node).collect()
    }

    /// Snapshot of neighbor ordinals with their edge scores.
    pub fn scored(&self) -> Vec<NodeScore> {
        self.state.read().merged()
    }

    /// Merge `candidates` with the current contents and keep the diverse
    /// subset, replacing whatever was here.
    ///
    /// `scorer(a, b)` must return the similarity between nodes `a` and `b`
    /// under the same function that produced the candidate scores.
    pub fn insert_diverse(&self, candidates: Vec<NodeScore>, alpha: f32, scorer: &PairScorer) {
        let mut state = self.state.write();
        let mut pool = state.merged();
        pool.extend(candidates);
        state.diverse = select_diverse(self.owner, pool, self.max_degree, alpha, scorer);
        state.overflow.clear();
    }

    /// Unconditionally insert an edge, deferring diversity.
    ///
    /// Used for bulk back-edge updates. Past the hard capacity the
    /// lowest-scoring member is evicted. Returns the resulting edge count
    /// so the caller can decide whether to trigger a diversity pass.
    pub fn insert_not_diverse(&self, node: u32, score: f32) -> usize {
        let mut state = self.state.write();
        if node == self.owner || state.contains(node) {
            return state.len();
        }
        state.overflow.push(NodeScore::new(node, score));
        if state.len() > self.hard_capacity {
            evict_worst(&mut state);
        }
        state.len()
    }

    /// Re-run diversity selection over the current contents, folding the
    /// overflow region back in.
    pub fn cleanup(&self, alpha: f32, scorer: &PairScorer) {
        let mut state = self.state.write();
        let pool = state.merged();
        state.diverse = select_diverse(self.owner, pool, self.max_degree, alpha, scorer);
        state.overflow.clear();
    }

    /// [`cleanup`](Self::cleanup), but only when the degree cap is actually
    /// exceeded. At-capacity sets are left untouched.
    pub fn enforce_degree(&self, alpha: f32, scorer: &PairScorer) {
        if self.len() > self.max_degree {
            self.cleanup(alpha, scorer);
        }
    }
}

fn evict_worst(state: &mut NeighborState) {
    let worst_of = |entries: &[NodeScore]| {
        entries
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.cmp(b))
            .map(|(i, e)| (i, *e))
    };
    match (worst_of(&state.diverse), worst_of(&state.overflow)) {
        (Some((di, d)), Some((oi, o))) => {
            if d < o {
                state.diverse.remove(di);
            } else {
                state.overflow.remove(oi);
            }
        }
        (Some((di, _)), None) => {
            state.diverse.remove(di);
        }
        (None, Some((oi, _))) => {
            state.overflow.remove(oi);
        }
        (None, None) => {}
    }
}

/// Diversity selection over a scored candidate pool.
///
/// Candidates are considered best-first (score descending, ties toward the
/// lower ordinal). `c` is admitted iff `alpha * sim(c, owner) > sim(c, r)`
/// for every already-admitted `r`. Selection stops at `max_degree`.
fn select_diverse(
    owner: u32,
    mut pool: Vec<NodeScore>,
    max_degree: usize,
    alpha: f32,
    scorer: &PairScorer,
) -> Vec<NodeScore> {
    pool.retain(|c| c.node != owner);
    pool.sort_by(|a, b| b.cmp(a));
    pool.dedup_by(|a, b| a.node == b.node);

    let mut selected: Vec<NodeScore> = Vec::with_capacity(max_degree.min(pool.len()));
    for c in pool {
        if selected.len() >= max_degree {
            break;
        }
        if selected.iter().any(|r| r.node == c.node) {
            continue;
        }
        let diverse = selected.iter().all(|r| alpha * c.score > scorer(c.node, r.node));
        if diverse {
            selected.push(c);
        }
    }
    selected
}
