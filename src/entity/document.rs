use crate::entity::{offer_title, Entity, EntityKey};
use crate::url::document_url;
use chrono::{DateTime, Utc};
use url::Url;

/// Where a post sits inside a sequence, as advertised by its own page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    /// The sequence the post belongs to
    pub collection_id: String,

    /// The sequence title shown in the navigation header
    pub collection_title: Option<String>,

    /// The previous post in reading order
    pub predecessor: Option<String>,

    /// The next post in reading order
    pub successor: Option<String>,
}

/// A single post
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub url: Url,
    pub title: Option<String>,

    /// Ids of posts linked from the body, in page order
    pub outgoing_documents: Vec<String>,

    /// Ids of posts linking here (pingbacks), in page order
    pub incoming_documents: Vec<String>,

    /// Ids of sequences linked from the body or containing this post
    pub outgoing_collections: Vec<String>,

    pub membership: Option<Membership>,

    /// Marked as curated by the site
    pub curated: bool,

    pub last_visited_at: Option<DateTime<Utc>>,
}

impl Document {
    /// Creates an unvisited post with its canonical URL under `base`
    pub fn new(id: impl Into<String>, base: &Url) -> Self {
        let id = id.into();
        let url = document_url(base, &id);
        Self {
            id,
            url,
            title: None,
            outgoing_documents: Vec::new(),
            incoming_documents: Vec::new(),
            outgoing_collections: Vec::new(),
            membership: None,
            curated: false,
            last_visited_at: None,
        }
    }
}

impl Entity for Document {
    fn key(&self) -> EntityKey {
        EntityKey::document(self.id.clone())
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
