//! Entity module for the two kinds of crawlable pages
//!
//! # Components
//!
//! - `Document`: a single post with its outgoing and incoming links
//! - `Collection`: an ordered sequence of posts
//! - `EntityKey`: the (kind, id) identity shared by both

mod collection;
mod document;

pub use collection::Collection;
pub use document::{Document, Membership};

use chrono::{DateTime, Utc};
use std::fmt;
use url::Url;

/// The kind of entity a link resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    /// A post
    Document,
    /// A sequence of posts
    Collection,
}

impl EntityKind {
    /// Human-readable label used in logs and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "post",
            Self::Collection => "sequence",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of an entity: equality is (kind, id) equality, never structural
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityKey {
    pub fn document(id: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Document,
            id: id.into(),
        }
    }

    pub fn collection(id: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Collection,
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// Capabilities shared by posts and sequences
pub trait Entity {
    /// The identity of this entity
    fn key(&self) -> EntityKey;

    /// The canonical URL of this entity
    fn url(&self) -> &Url;

    /// The resolved title, if known yet
    fn title(&self) -> Option<&str>;

    /// Sets the title unless one is already known
    ///
    /// Returns true if the title was taken.
    fn offer_title(&mut self, title: &str) -> bool;

    /// When this entity's own visit last ran
    fn last_visited_at(&self) -> Option<DateTime<Utc>>;

    /// Records that this entity's own visit ran at `at`
    fn mark_visited(&mut self, at: DateTime<Utc>);

    /// Returns true once the entity has been visited
    fn is_visited(&self) -> bool {
        self.last_visited_at().is_some()
    }
}

/// First non-empty title wins
pub(crate) fn offer_title(slot: &mut Option<String>, title: &str) -> bool {
    let title = title.trim();
    if slot.is_some() || title.is_empty() {
        return false;
    }
    *slot = Some(title.to_string());
    true
}
