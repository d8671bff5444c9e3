//! Link resolution
//!
//! Turns a raw link found on a page into the canonical identity of a post or
//! sequence. Canonical `/posts/{id}` and `/s/{id}` links resolve without any
//! network traffic. Sequence chapter and legacy links are fetched once and the
//! page's own title link tells us which post it is. Anything else is refused.
//!
//! Resolutions of one page run concurrently. Each one only touches the
//! registry through short lock scopes, so they never block each other across
//! a fetch.

use crate::crawler::extractor::{ContentExtractor, ExtractError, TitleProbe};
use crate::crawler::fetcher::{FetchError, Fetcher};
use crate::entity::{EntityKey, EntityKind};
use crate::registry::{lock, Registry};
use crate::url::{
    classify_link, collection_url, document_url, id_from_url, normalize_link,
    strip_title_segment, LinkShape,
};
use crate::UrlError;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use url::Url;

/// Errors from resolving a single link
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Url(#[from] UrlError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("No title element on {url}")]
    MissingMarkup { url: String },

    #[error("Title link on {url} is not a post or sequence")]
    Unrecognized { url: String },
}

/// The canonical identity behind a link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    pub key: EntityKey,
    pub title: Option<String>,
    pub url: Url,
}

/// Resolves raw links to posts and sequences
#[derive(Clone)]
pub struct LinkResolver {
    registry: Arc<Registry>,
    fetcher: Fetcher,
    extractor: Arc<dyn ContentExtractor>,
    force_revisit: bool,
    /// Pretty links already resolved this run, by normalized URL
    resolved: Arc<Mutex<HashMap<String, EntityKey>>>,
}

impl LinkResolver {
    pub fn new(
        registry: Arc<Registry>,
        fetcher: Fetcher,
        extractor: Arc<dyn ContentExtractor>,
        force_revisit: bool,
    ) -> Self {
        Self {
            registry,
            fetcher,
            extractor,
            force_revisit,
            resolved: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn base(&self) -> &Url {
        self.registry.base()
    }

    /// Resolves one raw link
    ///
    /// On success the entity exists in the registry, and any title or page
    /// content learned on the way has been recorded there for its own visit.
    pub async fn resolve(&self, raw: &str) -> Result<ResolvedLink, ResolveError> {
        let url = normalize_link(raw, self.base())?;

        match classify_link(&url) {
            LinkShape::Document { id } => Ok(self.known(EntityKey::document(id))),
            LinkShape::Collection { id } => Ok(self.known(EntityKey::collection(id))),
            LinkShape::Excluded => Err(UrlError::Excluded(url.to_string()).into()),
            LinkShape::Pretty => {
                if !self.force_revisit {
                    let cached = lock(&self.resolved).get(url.as_str()).cloned();
                    if let Some(key) = cached {
                        return Ok(self.known(key));
                    }
                }
                self.fetch_and_resolve(url).await
            }
        }
    }

    /// Resolves every link of a page concurrently, preserving input order
    pub async fn resolve_all(
        &self,
        links: &[String],
    ) -> Vec<(String, Result<ResolvedLink, ResolveError>)> {
        let results = join_all(links.iter().map(|link| self.resolve(link))).await;
        links.iter().cloned().zip(results).collect()
    }

    /// An identity that needs no fetch
    fn known(&self, key: EntityKey) -> ResolvedLink {
        let handle = self.registry.get_or_create(&key);
        let title = handle.title().or_else(|| self.registry.title(&key));
        let url = match key.kind {
            EntityKind::Document => document_url(self.base(), &key.id),
            EntityKind::Collection => collection_url(self.base(), &key.id),
        };
        ResolvedLink { key, title, url }
    }

    async fn fetch_and_resolve(&self, url: Url) -> Result<ResolvedLink, ResolveError> {
        let page = self.fetcher.fetch(&url).await?;

        let (key, title) = match self.extractor.probe_title(&page)? {
            TitleProbe::Canonical { href, title } => {
                let canonical = strip_title_segment(&normalize_link(&href, self.base())?);
                let key = match classify_link(&canonical) {
                    LinkShape::Document { id } => EntityKey::document(id),
                    LinkShape::Collection { id } => EntityKey::collection(id),
                    _ => {
                        return Err(ResolveError::Unrecognized {
                            url: url.to_string(),
                        })
                    }
                };
                (key, title)
            }
            TitleProbe::Alternate { title } => {
                let id = id_from_url(&url).ok_or_else(|| ResolveError::Unrecognized {
                    url: url.to_string(),
                })?;
                (EntityKey::document(id), title)
            }
            TitleProbe::Missing => {
                return Err(ResolveError::MissingMarkup {
                    url: url.to_string(),
                })
            }
        };

        self.registry.record_title(&key, &title);
        let handle = self.registry.get_or_create(&key);
        if !self.force_revisit && self.registry.record_page(&key, page) {
            tracing::trace!("Parked page of {}", key);
        }
        lock(&self.resolved).insert(url.to_string(), key.clone());

        tracing::debug!("Resolved {} to {}", url, key);

        Ok(ResolvedLink {
            url: match key.kind {
                EntityKind::Document => document_url(self.base(), &key.id),
                EntityKind::Collection => collection_url(self.base(), &key.id),
            },
            title: handle.title().or(Some(title)).filter(|t| !t.is_empty()),
            key,
        })
    }
}
