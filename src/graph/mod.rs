//! Graph module for persisting posts, sequences and their relationships
//!
//! This module handles:
//! - The `GraphStore` trait: the five idempotent write operations plus a node count
//! - A Neo4j implementation speaking Bolt through `neo4rs`
//! - An in-memory implementation used by tests and `--memory-graph` runs
//! - The `GraphWriter`, which retries store calls with backoff and turns
//!   visited entities into mutations
//!
//! # Title policy
//!
//! Every write path follows the same rule: the first non-null title supplied
//! for a node is kept. A node created without a title takes the first title
//! that arrives later; a node that already has a title is never overwritten.

mod memory;
mod neo4j;
mod traits;
mod writer;

pub use memory::{GraphSnapshot, MemoryGraph};
pub use neo4j::Neo4jStore;
pub use traits::{GraphError, GraphResult, GraphStore};
pub use writer::{CollectionWrite, DocumentWrite, GraphWriter, RetryPolicy};

/// Node label for posts
pub const DOCUMENT_LABEL: &str = "Post";

/// Node label for sequences
pub const COLLECTION_LABEL: &str = "Sequence";

/// Extra label on the first post of a sequence
pub const COLLECTION_START_LABEL: &str = "SequenceStart";

/// Extra label on the last post of a sequence
pub const COLLECTION_END_LABEL: &str = "SequenceEnd";

/// Relationship types written by the crawler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EdgeKind {
    /// Post body links to another post
    LinksTo,
    /// Reading order: one post continues to the next
    ContinuesTo,
    /// Sequence to its first post
    BeginsWith,
    /// Sequence to its last post
    EndsWith,
}

impl EdgeKind {
    /// The relationship type name in the graph
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LinksTo => "LINKS_TO",
            Self::ContinuesTo => "CONTINUES_TO",
            Self::BeginsWith => "BEGINS_WITH",
            Self::EndsWith => "ENDS_WITH",
        }
    }
}

/// A post node to upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentNode {
    pub id: String,
    pub title: Option<String>,
    pub url: Option<String>,
    /// Curated is sticky: once written true it is never cleared
    pub curated: bool,
}

impl DocumentNode {
    pub fn new(id: impl Into<String>, title: Option<String>) -> Self {
        Self {
            id: id.into(),
            title,
            url: None,
            curated: false,
        }
    }
}

/// A post together with its position in a sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterNode {
    pub id: String,
    pub title: Option<String>,
    /// Position key; assigned from enumeration order, so ties are not expected
    pub order: i64,
}

impl ChapterNode {
    pub fn new(id: impl Into<String>, title: Option<String>, order: i64) -> Self {
        Self {
            id: id.into(),
            title,
            order,
        }
    }
}

/// A sequence's chapters in reading order with the derived chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterChain {
    /// Chapters stably sorted by order key
    pub sorted: Vec<ChapterNode>,
    /// Consecutive (from, to) pairs for `CONTINUES_TO` edges
    pub pairs: Vec<(String, String)>,
}

impl ChapterChain {
    /// Stable-sorts chapters by their order key and derives the chain
    pub fn build(chapters: &[ChapterNode]) -> Self {
        let mut sorted = chapters.to_vec();
        sorted.sort_by_key(|c| c.order);

        let pairs = sorted
            .windows(2)
            .map(|w| (w[0].id.clone(), w[1].id.clone()))
            .collect();

        Self { sorted, pairs }
    }

    pub fn first(&self) -> Option<&ChapterNode> {
        self.sorted.first()
    }

    pub fn last(&self) -> Option<&ChapterNode> {
        self.sorted.last()
    }
}
