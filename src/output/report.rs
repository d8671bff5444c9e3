//! The record of one crawl run

use crate::entity::EntityKey;
use chrono::{DateTime, Utc};
use std::fmt;

/// Why the traversal loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Nothing unvisited was left in the frontier
    FrontierExhausted,
    /// `max-visits` entities were visited
    VisitCeiling,
    /// `run-deadline` elapsed
    Deadline,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::FrontierExhausted => "frontier exhausted",
            Self::VisitCeiling => "visit ceiling reached",
            Self::Deadline => "run deadline reached",
        };
        f.write_str(text)
    }
}

/// A link that was dropped from a visited entity's neighbors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLink {
    /// The entity whose page carried the link
    pub found_on: EntityKey,
    pub link: String,
    pub reason: String,
}

/// An entity whose own visit or persistence failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityFailure {
    pub key: EntityKey,
    pub reason: String,
}

/// Everything worth telling about a finished run
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Hash of the configuration file the run used
    pub config_hash: Option<String>,

    pub seed: EntityKey,

    pub visited_documents: u64,
    pub visited_collections: u64,

    /// Visits whose own page could not be fetched or read
    pub failed_visits: Vec<EntityFailure>,

    pub skipped_links: Vec<SkippedLink>,

    /// Visits whose graph writes failed after every retry
    pub failed_persists: Vec<EntityFailure>,

    /// Sequence pairs chained end to start
    pub stitches_applied: Vec<(String, String)>,

    /// Distinct entities still waiting when the loop stopped
    pub frontier_remaining: u64,

    pub stop_reason: Option<StopReason>,
}

impl CrawlReport {
    pub fn new(seed: EntityKey) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            config_hash: None,
            seed,
            visited_documents: 0,
            visited_collections: 0,
            failed_visits: Vec::new(),
            skipped_links: Vec::new(),
            failed_persists: Vec::new(),
            stitches_applied: Vec::new(),
            frontier_remaining: 0,
            stop_reason: None,
        }
    }

    pub fn total_visits(&self) -> u64 {
        self.visited_documents + self.visited_collections
    }

    /// Wall-clock duration in seconds, once finished
    pub fn duration_seconds(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_seconds())
    }

    /// Returns true if nothing failed or was skipped
    pub fn is_clean(&self) -> bool {
        self.failed_visits.is_empty()
            && self.skipped_links.is_empty()
            && self.failed_persists.is_empty()
    }
}
