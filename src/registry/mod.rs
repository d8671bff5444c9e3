//! Identity registry for posts and sequences
//!
//! The registry guarantees one shared instance per (kind, id) for the whole
//! crawl run. It is injected into the resolver and the coordinator; link
//! resolutions running concurrently inside one visit all go through it.
//!
//! Locks are held only for map lookups and inserts, never across an await.

mod cache;

pub use cache::{CachedPage, PageCache};

use crate::entity::{Collection, Document, Entity, EntityKey, EntityKind};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use url::Url;

/// Shared handle to the single instance of a post
pub type DocumentHandle = Arc<Mutex<Document>>;

/// Shared handle to the single instance of a sequence
pub type CollectionHandle = Arc<Mutex<Collection>>;

/// Shared handle to either kind of entity
#[derive(Debug, Clone)]
pub enum EntityHandle {
    Document(DocumentHandle),
    Collection(CollectionHandle),
}

impl EntityHandle {
    /// Returns true if both handles point at the same instance
    pub fn same_instance(&self, other: &EntityHandle) -> bool {
        match (self, other) {
            (Self::Document(a), Self::Document(b)) => Arc::ptr_eq(a, b),
            (Self::Collection(a), Self::Collection(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Offers a title to the underlying entity (first non-empty title wins)
    pub fn offer_title(&self, title: &str) -> bool {
        match self {
            Self::Document(d) => lock(d).offer_title(title),
            Self::Collection(c) => lock(c).offer_title(title),
        }
    }

    /// The entity's current title
    pub fn title(&self) -> Option<String> {
        match self {
            Self::Document(d) => lock(d).title.clone(),
            Self::Collection(c) => lock(c).title.clone(),
        }
    }
}

/// Locks a mutex, recovering the data if another holder panicked
///
/// Everything guarded by these locks is only ever extended, so the data is
/// still consistent after a poisoning panic.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Per-kind instance store plus the page and title cache
#[derive(Debug)]
pub struct Registry {
    base: Url,
    documents: Mutex<HashMap<String, DocumentHandle>>,
    collections: Mutex<HashMap<String, CollectionHandle>>,
    cache: PageCache,
}

impl Registry {
    /// Creates an empty registry for the site rooted at `base`
    pub fn new(base: Url) -> Self {
        Self {
            base,
            documents: Mutex::new(HashMap::new()),
            collections: Mutex::new(HashMap::new()),
            cache: PageCache::new(),
        }
    }

    /// The site base URL canonical URLs are built from
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Returns the post with this id, creating and registering it if needed
    ///
    /// A newly created post picks up any title already recorded for its id.
    pub fn document(&self, id: &str) -> DocumentHandle {
        let mut documents = lock(&self.documents);
        if let Some(existing) = documents.get(id) {
            return Arc::clone(existing);
        }

        let mut document = Document::new(id, &self.base);
        if let Some(title) = self.cache.title(&EntityKey::document(id)) {
            document.offer_title(&title);
        }

        let handle = Arc::new(Mutex::new(document));
        documents.insert(id.to_string(), Arc::clone(&handle));
        tracing::trace!("Registered post {}", id);
        handle
    }

    /// Returns the sequence with this id, creating and registering it if needed
    pub fn collection(&self, id: &str) -> CollectionHandle {
        let mut collections = lock(&self.collections);
        if let Some(existing) = collections.get(id) {
            return Arc::clone(existing);
        }

        let mut collection = Collection::new(id, &self.base);
        if let Some(title) = self.cache.title(&EntityKey::collection(id)) {
            collection.offer_title(&title);
        }

        let handle = Arc::new(Mutex::new(collection));
        collections.insert(id.to_string(), Arc::clone(&handle));
        tracing::trace!("Registered sequence {}", id);
        handle
    }

    /// Returns the entity for a key, creating it if needed
    pub fn get_or_create(&self, key: &EntityKey) -> EntityHandle {
        match key.kind {
            EntityKind::Document => EntityHandle::Document(self.document(&key.id)),
            EntityKind::Collection => EntityHandle::Collection(self.collection(&key.id)),
        }
    }

    /// Looks up a post without creating it
    pub fn find_document(&self, id: &str) -> Option<DocumentHandle> {
        lock(&self.documents).get(id).cloned()
    }

    /// Looks up a sequence without creating it
    pub fn find_collection(&self, id: &str) -> Option<CollectionHandle> {
        lock(&self.collections).get(id).cloned()
    }

    /// Records a title discovered while resolving a link to this entity
    ///
    /// The title is cached for entities created later and offered to the
    /// instance right away if it already exists.
    pub fn record_title(&self, key: &EntityKey, title: &str) {
        self.cache.put_title(key.clone(), title);

        let existing = match key.kind {
            EntityKind::Document => self.find_document(&key.id).map(EntityHandle::Document),
            EntityKind::Collection => self.find_collection(&key.id).map(EntityHandle::Collection),
        };
        if let Some(handle) = existing {
            handle.offer_title(title);
        }
    }

    /// The best known title for an entity
    pub fn title(&self, key: &EntityKey) -> Option<String> {
        self.cache.title(key)
    }

    /// Parks page content fetched for an entity so its own visit can reuse it
    ///
    /// Nothing is parked for an entity whose visit has already begun.
    pub fn record_page(&self, key: &EntityKey, content: String) -> bool {
        self.cache.put_page(key.clone(), content)
    }

    /// Marks the start of an entity's own visit and hands it any parked page
    pub fn begin_visit(&self, key: &EntityKey) -> Option<CachedPage> {
        self.cache.claim(key)
    }

    /// Number of pages parked and not yet used by a visit
    pub fn parked_pages(&self) -> usize {
        self.cache.page_count()
    }

    /// Number of registered posts
    pub fn document_count(&self) -> usize {
        lock(&self.documents).len()
    }

    /// Number of registered sequences
    pub fn collection_count(&self) -> usize {
        lock(&self.collections).len()
    }
}
