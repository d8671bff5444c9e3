//! Page and title cache shared between link resolution and visits
//!
//! Resolving a pretty link fetches the target page before that page's own
//! visit runs. The content and title learned that way are parked here so the
//! later visit can reuse them instead of fetching again. Entries never expire
//! during a run; a parked page is handed out once, to the entity's own visit.
//! Once that visit has started no page is parked for the entity again.

use crate::entity::EntityKey;
use crate::registry::lock;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// A page body fetched on behalf of an entity
#[derive(Debug, Clone)]
pub struct CachedPage {
    /// The raw page content
    pub content: String,

    /// When the page was fetched
    pub fetched_at: DateTime<Utc>,
}

impl CachedPage {
    /// Creates a new CachedPage stamped with the current time
    pub fn new(content: String) -> Self {
        Self {
            content,
            fetched_at: Utc::now(),
        }
    }
}

/// Process-lifetime cache of page content and resolved titles
#[derive(Debug, Default)]
pub struct PageCache {
    pages: Mutex<HashMap<EntityKey, CachedPage>>,
    titles: Mutex<HashMap<EntityKey, String>>,
    /// Entities whose own visit has started
    claimed: Mutex<HashSet<EntityKey>>,
}

impl PageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the latest fetched content for an entity, replacing any older copy
    ///
    /// Returns false without storing anything once the entity's visit has
    /// been claimed.
    pub fn put_page(&self, key: EntityKey, content: String) -> bool {
        if lock(&self.claimed).contains(&key) {
            return false;
        }
        lock(&self.pages).insert(key, CachedPage::new(content));
        true
    }

    /// Claims an entity's visit and hands over any content parked for it
    pub fn claim(&self, key: &EntityKey) -> Option<CachedPage> {
        lock(&self.claimed).insert(key.clone());
        lock(&self.pages).remove(key)
    }

    /// Stores a resolved title; the first non-empty title for a key wins
    pub fn put_title(&self, key: EntityKey, title: &str) {
        let title = title.trim();
        if title.is_empty() {
            return;
        }
        lock(&self.titles)
            .entry(key)
            .or_insert_with(|| title.to_string());
    }

    /// Returns the resolved title for an entity, if any
    pub fn title(&self, key: &EntityKey) -> Option<String> {
        lock(&self.titles).get(key).cloned()
    }

    /// Number of pages currently parked
    pub fn page_count(&self) -> usize {
        lock(&self.pages).len()
    }
}
