//! Crawl frontier and visited set
//!
//! The scheduler owns traversal bookkeeping only: a FIFO frontier of entity
//! keys and the set of keys already visited this run. Entities themselves live
//! in the registry.
//!
//! Breadth-first order falls out of the FIFO. A key discovered through several
//! links before its first visit sits in the frontier several times; the first
//! dequeue removes every other copy so it is visited once.

use crate::entity::EntityKey;
use std::collections::{HashSet, VecDeque};

/// Frontier and visited set for one run
#[derive(Debug, Default)]
pub struct Scheduler {
    /// Entities waiting to be visited, in discovery order
    frontier: VecDeque<EntityKey>,

    /// Entities whose visit has started this run
    visited: HashSet<EntityKey>,

    /// Stop handing out work after this many visits
    max_visits: Option<usize>,
}

impl Scheduler {
    /// Creates a scheduler with an optional visit ceiling
    pub fn new(max_visits: Option<usize>) -> Self {
        Self {
            frontier: VecDeque::new(),
            visited: HashSet::new(),
            max_visits,
        }
    }

    /// Appends a key to the frontier unless it was already visited
    ///
    /// Returns true if the key was queued.
    pub fn enqueue(&mut self, key: EntityKey) -> bool {
        if self.visited.contains(&key) {
            return false;
        }
        self.frontier.push_back(key);
        true
    }

    /// Queues every key in order, returning how many were accepted
    pub fn enqueue_all<I>(&mut self, keys: I) -> usize
    where
        I: IntoIterator<Item = EntityKey>,
    {
        keys.into_iter().filter(|key| self.enqueue(key.clone())).count()
    }

    /// Pops the next unvisited key
    ///
    /// Every other copy of the popped key is dropped from the frontier and
    /// keys visited in the meantime are skipped. Returns `None` once the
    /// frontier is empty or the visit ceiling has been reached.
    pub fn next_key(&mut self) -> Option<EntityKey> {
        if self.ceiling_reached() {
            return None;
        }

        while let Some(key) = self.frontier.pop_front() {
            self.frontier.retain(|queued| queued != &key);
            if self.visited.contains(&key) {
                tracing::trace!("Skipping visited {}", key);
                continue;
            }
            return Some(key);
        }
        None
    }

    /// Records that a key's visit has started
    pub fn mark_visited(&mut self, key: &EntityKey) {
        self.visited.insert(key.clone());
    }

    /// Returns true if the key was visited this run
    pub fn is_visited(&self, key: &EntityKey) -> bool {
        self.visited.contains(key)
    }

    /// Clears one key's visited mark and queues it again
    ///
    /// This is the only way an entity gets a second visit in a run.
    pub fn request_revisit(&mut self, key: EntityKey) {
        self.visited.remove(&key);
        self.frontier.push_back(key);
    }

    /// Number of queued entries, duplicates included
    pub fn frontier_size(&self) -> usize {
        self.frontier.len()
    }

    /// Number of distinct keys still waiting
    pub fn pending_count(&self) -> usize {
        self.frontier
            .iter()
            .filter(|key| !self.visited.contains(*key))
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Returns true once the visit ceiling has been hit
    pub fn ceiling_reached(&self) -> bool {
        self.max_visits
            .map(|max| self.visited.len() >= max)
            .unwrap_or(false)
    }

    /// Returns true if nothing unvisited is left to hand out
    pub fn is_exhausted(&self) -> bool {
        self.pending_count() == 0
    }
}
