use crate::entity::{offer_title, Entity, EntityKey};
use crate::url::collection_url;
use chrono::{DateTime, Utc};
use url::Url;

/// An ordered sequence of posts
#[derive(Debug, Clone)]
pub struct Collection {
    pub id: String,
    pub url: Url,
    pub title: Option<String>,

    /// Member post ids in reading order
    pub documents: Vec<String>,

    pub last_visited_at: Option<DateTime<Utc>>,
}

impl Collection {
    /// Creates an unvisited sequence with its canonical URL under `base`
    pub fn new(id: impl Into<String>, base: &Url) -> Self {
        let id = id.into();
        let url = collection_url(base, &id);
        Self {
            id,
            url,
            title: None,
            documents: Vec::new(),
            last_visited_at: None,
        }
    }
}

impl Entity for Collection {
    fn key(&self) -> EntityKey {
        EntityKey::collection(self.id.clone())
    }

    fn url(&self) -> &Url {
        &self.url
    }

    fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    fn offer_title(&mut self, title: &str) -> bool {
        offer_title(&mut self.title, title)
    }

    fn last_visited_at(&self) -> Option<DateTime<Utc>> {
        self.last_visited_at
    }

    fn mark_visited(&mut self, at: DateTime<Utc>) {
        self.last_visited_at = Some(at);
    }
}
