//! Scored-node ordering and the bounded result queue.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A node ordinal with its similarity score.
///
/// Totally ordered: higher score is greater; equal scores break toward the
/// *lower* ordinal being greater, so heaps and sorts prefer older nodes on
/// ties.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeScore {
    pub node: u32,
    pub score: f32,
}

impl NodeScore {
    #[must_use]
    pub fn new(node: u32, score: f32) -> Self {
        Self { node, score }
    }
}

impl Eq for NodeScore {}

impl Ord for NodeScore {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for NodeScore {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-heap bounded at `capacity`, keeping the `capacity` best entries.
#[derive(Debug)]
pub struct BoundedNodeQueue {
    heap: BinaryHeap<std::cmp::Reverse<NodeScore>>,
    capacity: usize,
}

impl BoundedNodeQueue {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity.saturating_add(1)),
            capacity,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    /// Score of the worst retained entry, if any.
    #[must_use]
    pub fn worst_score(&self) -> Option<f32> {
        self.heap.peek().map(|r| r.0.score)
    }

    /// Insert, evicting and returning the displaced worst entry when full.
    ///
    /// Returns `None` when the queue had room; `Some(entry)` itself when the
    /// new entry ranks below everything retained.
    pub fn push(&mut self, entry: NodeScore) -> Option<NodeScore> {
        if self.capacity == 0 {
            return Some(entry);
        }
        self.heap.push(std::cmp::Reverse(entry));
        if self.heap.len() > self.capacity {
            return self.heap.pop().map(|r| r.0);
        }
        None
    }

    /// Drain into a vector sorted best-first.
    #[must_use]
    pub fn into_sorted_vec(self) -> Vec<NodeScore> {
        let mut v: Vec<NodeScore> = self.heap.into_iter().map(|r| r.0).collect();
        v.sort_by(|a, b| b.cmp(a));
        v
    }
}
