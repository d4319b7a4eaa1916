// SPDX-License-Identifier: MIT OR Apache-2.0
//! Frontier containers behind the strategy choice.
//!
//! BFS, DFS, and Greedy are genuine frontier shapes (queue, stack,
//! priority heap). Random and Hybrid are loop shapes implemented by the
//! engine itself on top of these.

use serde::{Deserialize, Serialize};
use std::collections::{BinaryHeap, VecDeque};
use std::fmt;
use std::str::FromStr;
use sx_core::{ExplorationContext, State};

/// The traversal strategy for one exploration run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Breadth-first: level by level, shortest paths first.
    #[default]
    Bfs,
    /// Depth-first: follow each chain as deep as it goes.
    Dfs,
    /// Seeded random walk with resets.
    Random,
    /// Prioritize states with the most unexplored actions.
    Greedy,
    /// Shallow BFS pass, then greedy for the rest.
    Hybrid,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Strategy::Bfs => "bfs",
            Strategy::Dfs => "dfs",
            Strategy::Random => "random",
            Strategy::Greedy => "greedy",
            Strategy::Hybrid => "hybrid",
        };
        f.write_str(s)
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bfs" => Ok(Strategy::Bfs),
            "dfs" => Ok(Strategy::Dfs),
            "random" => Ok(Strategy::Random),
            "greedy" => Ok(Strategy::Greedy),
            "hybrid" => Ok(Strategy::Hybrid),
            other => Err(format!("unknown strategy: {other}")),
        }
    }
}

/// One pending frontier entry: a state to expand, its depth, and the
/// context accumulated along the branch that reached it.
#[derive(Debug, Clone)]
pub struct FrontierEntry {
    /// State to expand.
    pub state: State,
    /// Depth at which it was reached.
    pub depth: u32,
    /// Branch context.
    pub context: ExplorationContext,
}

impl FrontierEntry {
    /// Bundle a frontier entry.
    #[must_use]
    pub fn new(state: State, depth: u32, context: ExplorationContext) -> Self {
        FrontierEntry { state, depth, context }
    }
}

/// A frontier of pending `(state, depth, context)` entries. The container
/// shape (queue, stack, heap) is what distinguishes the strategies.
pub trait Frontier {
    /// Insert an entry. `priority` is only meaningful to the greedy
    /// frontier (its unexplored-action count).
    fn push(&mut self, entry: FrontierEntry, priority: usize);

    /// Remove and return the next entry to expand.
    fn next(&mut self) -> Option<FrontierEntry>;

    /// Whether anything is pending.
    fn is_empty(&self) -> bool;
}

/// Build the frontier for a strategy. Random and Hybrid have no frontier
/// of their own; they reuse these from the engine's loop shapes.
#[must_use]
pub fn frontier_for(strategy: Strategy) -> Box<dyn Frontier + Send> {
    match strategy {
        Strategy::Dfs => Box::new(DfsFrontier::default()),
        Strategy::Greedy => Box::new(GreedyFrontier::default()),
        Strategy::Bfs | Strategy::Random | Strategy::Hybrid => Box::new(BfsFrontier::default()),
    }
}

/// FIFO frontier.
#[derive(Debug, Default)]
pub struct BfsFrontier {
    queue: VecDeque<FrontierEntry>,
}

impl Frontier for BfsFrontier {
    fn push(&mut self, entry: FrontierEntry, _priority: usize) {
        self.queue.push_back(entry);
    }

    fn next(&mut self) -> Option<FrontierEntry> {
        self.queue.pop_front()
    }

    fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// LIFO frontier. Callers push discovered children in reversed order so
/// expansion stays left-to-right.
#[derive(Debug, Default)]
pub struct DfsFrontier {
    stack: Vec<FrontierEntry>,
}

impl Frontier for DfsFrontier {
    fn push(&mut self, entry: FrontierEntry, _priority: usize) {
        self.stack.push(entry);
    }

    fn next(&mut self) -> Option<FrontierEntry> {
        self.stack.pop()
    }

    fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

/// Max-heap frontier keyed by unexplored-action count; insertion order
/// breaks ties so runs stay deterministic.
#[derive(Debug, Default)]
pub struct GreedyFrontier {
    heap: BinaryHeap<GreedyEntry>,
    sequence: u64,
}

#[derive(Debug)]
struct GreedyEntry {
    priority: usize,
    sequence: u64,
    entry: FrontierEntry,
}

impl PartialEq for GreedyEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl Eq for GreedyEntry {}

impl Ord for GreedyEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Higher unexplored-count wins; earlier insertion wins ties.
        self.priority
            .cmp(&other.priority)
            .then(other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for GreedyEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Frontier for GreedyFrontier {
    fn push(&mut self, entry: FrontierEntry, priority: usize) {
        self.sequence += 1;
        self.heap.push(GreedyEntry {
            priority,
            sequence: self.sequence,
            entry,
        });
    }

    fn next(&mut self) -> Option<FrontierEntry> {
        self.heap.pop().map(|e| e.entry)
    }

    fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
