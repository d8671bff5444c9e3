//! Crawler coordinator - main crawl orchestration logic
//!
//! One traversal loop drives the frontier strictly in order: only one
//! entity's visit is in flight at a time. Inside a visit every link found on
//! the page is resolved concurrently and the visit waits for all of them
//! before persisting and queueing the neighbors it found.
//!
//! Sequence stitching needs both sequences' chains in the graph, so stitches
//! are collected while posts are visited and applied once the loop stops.

use crate::config::Config;
use crate::crawler::extractor::{ContentExtractor, DocumentExtraction, HtmlExtractor};
use crate::crawler::fetcher::{FetchError, Fetcher};
use crate::crawler::resolver::{LinkResolver, ResolveError, ResolvedLink};
use crate::crawler::scheduler::Scheduler;
use crate::entity::{Entity, EntityKey, EntityKind, Membership};
use crate::graph::{
    ChapterNode, CollectionWrite, DocumentNode, DocumentWrite, GraphStore, GraphWriter,
    RetryPolicy,
};
use crate::output::{CrawlReport, EntityFailure, SkippedLink, StopReason};
use crate::registry::{lock, Registry};
use crate::PostgraphError;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;
use url::Url;

/// Log a progress line every this many visits
const PROGRESS_INTERVAL: u64 = 10;

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    registry: Arc<Registry>,
    fetcher: Fetcher,
    extractor: Arc<dyn ContentExtractor>,
    resolver: LinkResolver,
    scheduler: Scheduler,
    writer: GraphWriter,
    seed: Option<EntityKey>,
    config_hash: Option<String>,
    /// Sequence position of every visited post that advertised one
    memberships: BTreeMap<String, Membership>,
}

/// Links of one post page, resolved
struct DocumentNeighbors {
    outgoing: Vec<ResolvedLink>,
    incoming: Vec<ResolvedLink>,
    collections: Vec<ResolvedLink>,
    membership: Option<Membership>,
}

impl Coordinator {
    /// Creates a coordinator that reads pages with the HTML extractor
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `store` - The graph store visited entities are written to
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(PostgraphError)` - Invalid base URL or HTTP client setup failure
    pub fn new(config: Config, store: Arc<dyn GraphStore>) -> Result<Self, PostgraphError> {
        Self::with_extractor(config, store, Arc::new(HtmlExtractor::new()))
    }

    /// Creates a coordinator with a custom content extractor
    pub fn with_extractor(
        config: Config,
        store: Arc<dyn GraphStore>,
        extractor: Arc<dyn ContentExtractor>,
    ) -> Result<Self, PostgraphError> {
        let base = config.base_url()?;
        let registry = Arc::new(Registry::new(base));
        let fetcher = Fetcher::from_config(&config)?;
        let resolver = LinkResolver::new(
            Arc::clone(&registry),
            fetcher.clone(),
            Arc::clone(&extractor),
            config.crawler.force_revisit,
        );
        let scheduler = Scheduler::new(config.crawler.max_visits.map(|max| max as usize));
        let writer = GraphWriter::new(
            store,
            RetryPolicy::new(config.graph.write_attempts, config.graph.retry_backoff()),
        );

        Ok(Self {
            config: Arc::new(config),
            registry,
            fetcher,
            extractor,
            resolver,
            scheduler,
            writer,
            seed: None,
            config_hash: None,
            memberships: BTreeMap::new(),
        })
    }

    /// Attaches the configuration hash written into the report
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    /// Queues the first post, optionally overriding its title
    pub fn seed(&mut self, id: &str, title: Option<&str>) {
        let key = EntityKey::document(id);
        if let Some(title) = title {
            self.registry.record_title(&key, title);
        }
        self.registry.document(id);
        self.scheduler.enqueue(key.clone());
        self.seed = Some(key);
    }

    /// Clears one entity's visited mark and queues it again
    pub fn request_revisit(&mut self, key: EntityKey) {
        self.scheduler.request_revisit(key);
    }

    /// The identity registry of this run
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    fn base(&self) -> &Url {
        self.registry.base()
    }

    /// Runs the traversal loop until the frontier drains or a bound is hit
    ///
    /// Failures of single links, visits or writes are recorded in the report;
    /// they never end the run.
    pub async fn run(&mut self) -> Result<CrawlReport, PostgraphError> {
        let seed = self
            .seed
            .clone()
            .unwrap_or_else(|| EntityKey::document(self.config.seed.id.clone()));
        let mut report = CrawlReport::new(seed.clone());
        report.config_hash = self.config_hash.clone();

        tracing::info!("Starting crawl from {}", seed);

        let start_time = Instant::now();
        let deadline = self.config.crawler.run_deadline();
        let mut visits: u64 = 0;

        let stop_reason = loop {
            let remaining = match deadline {
                Some(limit) => match limit.checked_sub(start_time.elapsed()) {
                    Some(remaining) if !remaining.is_zero() => Some(remaining),
                    _ => break StopReason::Deadline,
                },
                None => None,
            };

            let Some(key) = self.scheduler.next_key() else {
                if self.scheduler.ceiling_reached() && !self.scheduler.is_exhausted() {
                    break StopReason::VisitCeiling;
                }
                break StopReason::FrontierExhausted;
            };

            self.scheduler.mark_visited(&key);

            let neighbors = match remaining {
                Some(remaining) => {
                    match tokio::time::timeout(remaining, self.visit(&key, &mut report)).await {
                        Ok(neighbors) => neighbors,
                        Err(_) => {
                            tracing::warn!("Run deadline reached while visiting {}", key);
                            report.failed_visits.push(EntityFailure {
                                key: key.clone(),
                                reason: "run deadline reached".to_string(),
                            });
                            break StopReason::Deadline;
                        }
                    }
                }
                None => self.visit(&key, &mut report).await,
            };

            let queued = self.scheduler.enqueue_all(neighbors);
            tracing::debug!("Queued {} neighbors of {}", queued, key);

            visits += 1;
            if visits % PROGRESS_INTERVAL == 0 {
                let rate = visits as f64 / start_time.elapsed().as_secs_f64();
                tracing::info!(
                    "Progress: {} visited, {} waiting, {:.2} visits/sec",
                    visits,
                    self.scheduler.pending_count(),
                    rate
                );
            }
        };

        self.apply_stitches(&mut report).await;

        let unused = self.registry.parked_pages();
        if unused > 0 {
            tracing::debug!("{} parked pages were never visited", unused);
        }

        report.stop_reason = Some(stop_reason);
        report.frontier_remaining = self.scheduler.pending_count() as u64;
        report.finished_at = Some(Utc::now());

        tracing::info!(
            "Crawl finished ({}): {} posts and {} sequences visited in {:?}",
            stop_reason,
            report.visited_documents,
            report.visited_collections,
            start_time.elapsed()
        );

        Ok(report)
    }

    /// Visits one entity and returns the neighbors to queue
    async fn visit(&mut self, key: &EntityKey, report: &mut CrawlReport) -> Vec<EntityKey> {
        match key.kind {
            EntityKind::Document => self.visit_document(&key.id, report).await,
            EntityKind::Collection => self.visit_collection(&key.id, report).await,
        }
    }

    /// Page content for an entity's own visit
    ///
    /// Content parked while resolving someone else's link is used once,
    /// unless the run bypasses the cache. From here on nothing is parked for
    /// this entity, not even by links on its own page.
    async fn page_for(&self, key: &EntityKey, url: &Url) -> Result<String, FetchError> {
        let parked = self.registry.begin_visit(key);
        if !self.config.crawler.force_revisit {
            if let Some(cached) = parked {
                tracing::debug!("Reusing page of {} fetched at {}", key, cached.fetched_at);
                return Ok(cached.content);
            }
        }
        self.fetcher.fetch(url).await
    }

    async fn visit_document(&mut self, id: &str, report: &mut CrawlReport) -> Vec<EntityKey> {
        let key = EntityKey::document(id);
        let handle = self.registry.document(id);
        let url = lock(&handle).url.clone();

        tracing::info!("Visiting {} ({})", key, url);

        let page = match self.page_for(&key, &url).await {
            Ok(page) => page,
            Err(e) => {
                fail_visit(report, &key, e.to_string());
                return Vec::new();
            }
        };

        let extraction = match self.extractor.extract_document(&page, self.base()) {
            Ok(extraction) => extraction,
            Err(e) => {
                fail_visit(report, &key, e.to_string());
                return Vec::new();
            }
        };
        drop(page);

        let neighbors = self.resolve_document_links(&key, &extraction, report).await;

        if let (Some(title), Some(membership)) = (
            extraction.collection_nav_title.as_deref(),
            neighbors.membership.as_ref(),
        ) {
            self.registry
                .record_title(&EntityKey::collection(membership.collection_id.clone()), title);
        }

        let node = {
            let mut document = lock(&handle);
            if let Some(title) = &extraction.title {
                document.offer_title(title);
            }
            document.outgoing_documents = ids(&neighbors.outgoing);
            document.incoming_documents = ids(&neighbors.incoming);
            document.outgoing_collections = ids(&neighbors.collections);
            document.membership = neighbors.membership.clone();
            document.curated |= extraction.curated;
            document.mark_visited(Utc::now());

            DocumentNode {
                id: document.id.clone(),
                title: document.title.clone(),
                url: Some(document.url.to_string()),
                curated: document.curated,
            }
        };
        report.visited_documents += 1;

        if let Some(membership) = &neighbors.membership {
            self.memberships.insert(id.to_string(), membership.clone());
        }

        let write = DocumentWrite {
            document: node,
            outgoing: neighbors.outgoing.iter().map(|r| self.node_for(r)).collect(),
            incoming: neighbors.incoming.iter().map(|r| self.node_for(r)).collect(),
            collections: neighbors
                .collections
                .iter()
                .map(|r| (r.key.id.clone(), self.current_title(&r.key)))
                .collect(),
        };
        if let Err(e) = self.writer.persist_document(&write).await {
            fail_persist(report, &key, e.to_string());
        }

        neighbors
            .outgoing
            .iter()
            .chain(neighbors.incoming.iter())
            .chain(neighbors.collections.iter())
            .map(|r| r.key.clone())
            .collect()
    }

    /// Resolves every link of a post page in one concurrent batch
    async fn resolve_document_links(
        &self,
        key: &EntityKey,
        extraction: &DocumentExtraction,
        report: &mut CrawlReport,
    ) -> DocumentNeighbors {
        let outgoing_count = extraction.outgoing_links.len();
        let incoming_count = extraction.incoming_links.len();

        let mut links: Vec<String> = Vec::with_capacity(outgoing_count + incoming_count + 3);
        links.extend(extraction.outgoing_links.iter().cloned());
        links.extend(extraction.incoming_links.iter().cloned());
        let navigation = [
            extraction.collection_nav_url.as_ref(),
            extraction.predecessor_link.as_ref(),
            extraction.successor_link.as_ref(),
        ];
        links.extend(navigation.iter().flatten().map(|link| link.to_string()));

        let mut results = self.resolver.resolve_all(&links).await.into_iter();

        let mut neighbors = DocumentNeighbors {
            outgoing: Vec::new(),
            incoming: Vec::new(),
            collections: Vec::new(),
            membership: None,
        };

        for (link, result) in results.by_ref().take(outgoing_count) {
            if let Some(resolved) = accept(report, key, link, result) {
                match resolved.key.kind {
                    EntityKind::Document => push_unique(&mut neighbors.outgoing, resolved, key),
                    EntityKind::Collection => {
                        push_unique(&mut neighbors.collections, resolved, key)
                    }
                }
            }
        }

        for (link, result) in results.by_ref().take(incoming_count) {
            if let Some(resolved) = accept(report, key, link, result) {
                match resolved.key.kind {
                    EntityKind::Document => push_unique(&mut neighbors.incoming, resolved, key),
                    EntityKind::Collection => {
                        tracing::debug!("Ignoring sequence pingback {} on {}", resolved.key, key)
                    }
                }
            }
        }

        let mut next_navigation = || -> Option<ResolvedLink> {
            let (link, result) = results.next()?;
            accept(report, key, link, result)
        };

        let collection = extraction
            .collection_nav_url
            .as_ref()
            .and_then(|_| next_navigation())
            .filter(|r| r.key.kind == EntityKind::Collection);
        let predecessor = extraction
            .predecessor_link
            .as_ref()
            .and_then(|_| next_navigation())
            .filter(|r| r.key.kind == EntityKind::Document);
        let successor = extraction
            .successor_link
            .as_ref()
            .and_then(|_| next_navigation())
            .filter(|r| r.key.kind == EntityKind::Document);

        if let Some(collection) = collection {
            neighbors.membership = Some(Membership {
                collection_id: collection.key.id.clone(),
                collection_title: extraction.collection_nav_title.clone(),
                predecessor: predecessor.map(|r| r.key.id),
                successor: successor.map(|r| r.key.id),
            });
            push_unique(&mut neighbors.collections, collection, key);
        }

        neighbors
    }

    async fn visit_collection(&mut self, id: &str, report: &mut CrawlReport) -> Vec<EntityKey> {
        let key = EntityKey::collection(id);
        let handle = self.registry.collection(id);
        let url = lock(&handle).url.clone();

        tracing::info!("Visiting {} ({})", key, url);

        let page = match self.page_for(&key, &url).await {
            Ok(page) => page,
            Err(e) => {
                fail_visit(report, &key, e.to_string());
                return Vec::new();
            }
        };

        let extraction = match self.extractor.extract_collection(&page, self.base()) {
            Ok(extraction) => extraction,
            Err(e) => {
                fail_visit(report, &key, e.to_string());
                return Vec::new();
            }
        };
        drop(page);

        let results = self.resolver.resolve_all(&extraction.chapter_links).await;
        let mut members: Vec<ResolvedLink> = Vec::new();
        for (link, result) in results {
            match accept(report, &key, link.clone(), result) {
                Some(resolved) if resolved.key.kind == EntityKind::Document => {
                    if !members.iter().any(|m| m.key == resolved.key) {
                        members.push(resolved);
                    }
                }
                Some(resolved) => skip_link(
                    report,
                    &key,
                    link,
                    format!("chapter link resolved to {}", resolved.key),
                ),
                None => {}
            }
        }

        let chapters: Vec<ChapterNode> = members
            .iter()
            .enumerate()
            .map(|(order, member)| {
                ChapterNode::new(
                    member.key.id.clone(),
                    self.current_title(&member.key),
                    order as i64,
                )
            })
            .collect();

        let title = {
            let mut collection = lock(&handle);
            if let Some(title) = &extraction.title {
                collection.offer_title(title);
            }
            collection.documents = ids(&members);
            collection.mark_visited(Utc::now());
            collection.title.clone()
        };
        report.visited_collections += 1;

        let write = CollectionWrite {
            id: id.to_string(),
            title,
            chapters,
        };
        if let Err(e) = self.writer.persist_collection(&write).await {
            fail_persist(report, &key, e.to_string());
        }

        if self.config.crawler.expand_collections {
            members.into_iter().map(|m| m.key).collect()
        } else {
            Vec::new()
        }
    }

    /// Sequence pairs where a visited post's neighbor lives in another sequence
    fn pending_stitches(&self) -> BTreeSet<(String, String)> {
        let mut pairs = BTreeSet::new();
        for membership in self.memberships.values() {
            if let Some(next) = membership
                .successor
                .as_ref()
                .and_then(|id| self.memberships.get(id))
            {
                if next.collection_id != membership.collection_id {
                    pairs.insert((membership.collection_id.clone(), next.collection_id.clone()));
                }
            }
            if let Some(previous) = membership
                .predecessor
                .as_ref()
                .and_then(|id| self.memberships.get(id))
            {
                if previous.collection_id != membership.collection_id {
                    pairs.insert((previous.collection_id.clone(), membership.collection_id.clone()));
                }
            }
        }
        pairs
    }

    /// Chains sequences whose reading order continues into another sequence
    ///
    /// Only pairs where both sequences were visited are written; otherwise a
    /// begins/ends edge the stitch depends on would be missing.
    async fn apply_stitches(&mut self, report: &mut CrawlReport) {
        for (first, second) in self.pending_stitches() {
            let both_visited = self
                .scheduler
                .is_visited(&EntityKey::collection(first.clone()))
                && self
                    .scheduler
                    .is_visited(&EntityKey::collection(second.clone()));
            if !both_visited {
                tracing::debug!("Not stitching {} -> {}: sequence not visited", first, second);
                continue;
            }

            match self.writer.stitch_collections(&first, &second).await {
                Ok(()) => {
                    tracing::info!("Stitched sequence {} -> {}", first, second);
                    report.stitches_applied.push((first, second));
                }
                Err(e) => fail_persist(report, &EntityKey::collection(first), e.to_string()),
            }
        }
    }

    /// The best title known right now for an entity
    fn current_title(&self, key: &EntityKey) -> Option<String> {
        self.registry
            .get_or_create(key)
            .title()
            .or_else(|| self.registry.title(key))
    }

    fn node_for(&self, resolved: &ResolvedLink) -> DocumentNode {
        DocumentNode {
            url: Some(resolved.url.to_string()),
            ..DocumentNode::new(
                resolved.key.id.clone(),
                self.current_title(&resolved.key).or_else(|| resolved.title.clone()),
            )
        }
    }
}

fn ids(links: &[ResolvedLink]) -> Vec<String> {
    links.iter().map(|r| r.key.id.clone()).collect()
}

/// Adds a neighbor unless it is the visited entity itself or already present
fn push_unique(list: &mut Vec<ResolvedLink>, resolved: ResolvedLink, own: &EntityKey) {
    if &resolved.key != own && !list.iter().any(|r| r.key == resolved.key) {
        list.push(resolved);
    }
}

/// Keeps a successful resolution and reports a failed one
fn accept(
    report: &mut CrawlReport,
    found_on: &EntityKey,
    link: String,
    result: Result<ResolvedLink, ResolveError>,
) -> Option<ResolvedLink> {
    match result {
        Ok(resolved) => {
            tracing::debug!("{} -> {}", link, resolved.key);
            Some(resolved)
        }
        Err(e) => {
            skip_link(report, found_on, link, e.to_string());
            None
        }
    }
}

fn skip_link(report: &mut CrawlReport, found_on: &EntityKey, link: String, reason: String) {
    tracing::warn!("Skipping link {} on {}: {}", link, found_on, reason);
    report.skipped_links.push(SkippedLink {
        found_on: found_on.clone(),
        link,
        reason,
    });
}

fn fail_visit(report: &mut CrawlReport, key: &EntityKey, reason: String) {
    tracing::error!("Visit of {} failed: {}", key, reason);
    report.failed_visits.push(EntityFailure {
        key: key.clone(),
        reason,
    });
}

fn fail_persist(report: &mut CrawlReport, key: &EntityKey, reason: String) {
    tracing::warn!("Writing {} to the graph failed: {}", key, reason);
    report.failed_persists.push(EntityFailure {
        key: key.clone(),
        reason,
    });
}

/// Crawls from the configured seed into `store`
///
/// # Example
///
/// ```no_run
/// use postgraph::config::load_config;
/// use postgraph::crawler::run_crawl;
/// use postgraph::MemoryGraph;
/// use std::path::Path;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("postgraph.toml"))?;
/// let report = run_crawl(config, Arc::new(MemoryGraph::new())).await?;
/// println!("{} posts visited", report.visited_documents);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: Config,
    store: Arc<dyn GraphStore>,
) -> Result<CrawlReport, PostgraphError> {
    let seed_id = config.seed.id.clone();
    let seed_title = config.seed.title.clone();

    let mut coordinator = Coordinator::new(config, store)?;
    coordinator.seed(&seed_id, seed_title.as_deref());
    coordinator.run().await
}
