//! Graph writer: turns visited entities into idempotent store calls
//!
//! Every store call is retried with exponential backoff. Because each call is
//! an upsert on its own, a retry after a partial failure converges on the
//! same graph; the calls issued for one entity are not transactional.

use crate::graph::traits::{GraphError, GraphResult, GraphStore};
use crate::graph::{ChapterNode, DocumentNode};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on a single backoff sleep
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// How store calls are retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per store call, including the first
    pub attempts: u32,

    /// Delay before the second attempt; doubled for each further attempt
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

/// Everything written for one visited post
#[derive(Debug, Clone)]
pub struct DocumentWrite {
    pub document: DocumentNode,
    /// Posts the body links to
    pub outgoing: Vec<DocumentNode>,
    /// Posts that link here
    pub incoming: Vec<DocumentNode>,
    /// Sequences the post links to or belongs to: (id, title)
    pub collections: Vec<(String, Option<String>)>,
}

/// Everything written for one visited sequence
#[derive(Debug, Clone)]
pub struct CollectionWrite {
    pub id: String,
    pub title: Option<String>,
    pub chapters: Vec<ChapterNode>,
}

/// Retrying front end to a [`GraphStore`]
#[derive(Clone)]
pub struct GraphWriter {
    store: Arc<dyn GraphStore>,
    retry: RetryPolicy,
}

impl GraphWriter {
    pub fn new(store: Arc<dyn GraphStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Runs a store call, retrying failures with backoff
    async fn with_retry<T, F, Fut>(&self, operation: &str, mut call: F) -> GraphResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = GraphResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.retry.attempts => {
                    let delay = self.retry.delay_after(attempt);
                    tracing::warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        operation,
                        attempt,
                        self.retry.attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(GraphError::RetriesExhausted {
                        operation: operation.to_string(),
                        attempts: attempt,
                        source: Box::new(e),
                    });
                }
            }
        }
    }

    /// Persists a visited post, its neighbors and the edges between them
    pub async fn persist_document(&self, write: &DocumentWrite) -> GraphResult<()> {
        let mut nodes = Vec::with_capacity(1 + write.outgoing.len() + write.incoming.len());
        nodes.push(write.document.clone());
        nodes.extend(write.outgoing.iter().cloned());
        nodes.extend(write.incoming.iter().cloned());
        self.with_retry("upsert_documents", || self.store.upsert_documents(&nodes))
            .await?;

        let outgoing: Vec<String> = write.outgoing.iter().map(|d| d.id.clone()).collect();
        if !outgoing.is_empty() {
            self.with_retry("link_document_to_documents", || {
                self.store.link_document_to_documents(&write.document.id, &outgoing)
            })
            .await?;
        }

        let incoming: Vec<String> = write.incoming.iter().map(|d| d.id.clone()).collect();
        if !incoming.is_empty() {
            self.with_retry("link_documents_to_document", || {
                self.store.link_documents_to_document(&incoming, &write.document.id)
            })
            .await?;
        }

        for (id, title) in &write.collections {
            self.with_retry("upsert_collection", || {
                self.store.upsert_collection(id, title.as_deref())
            })
            .await?;
        }

        tracing::debug!(
            "Persisted post {} ({} outgoing, {} incoming, {} sequences)",
            write.document.id,
            outgoing.len(),
            incoming.len(),
            write.collections.len()
        );
        Ok(())
    }

    /// Persists a visited sequence and its reading chain
    pub async fn persist_collection(&self, write: &CollectionWrite) -> GraphResult<()> {
        self.with_retry("upsert_collection", || {
            self.store
                .upsert_collection(&write.id, write.title.as_deref())
        })
        .await?;

        if !write.chapters.is_empty() {
            self.with_retry("link_collection_chapters", || {
                self.store.link_collection_chapters(&write.id, &write.chapters)
            })
            .await?;
        }

        tracing::debug!(
            "Persisted sequence {} with {} chapters",
            write.id,
            write.chapters.len()
        );
        Ok(())
    }

    /// Chains the end of `first` to the start of `second`
    pub async fn stitch_collections(&self, first: &str, second: &str) -> GraphResult<()> {
        self.with_retry("link_collections", || {
            self.store.link_collections(first, second)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityKey;
    use crate::graph::{EdgeKind, MemoryGraph};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` calls of any kind, then delegates
    struct FlakyStore {
        inner: MemoryGraph,
        failures: AtomicU32,
        calls: AtomicU32,
    }

    impl FlakyStore {
        fn new(failures: u32) -> Self {
            Self {
                inner: MemoryGraph::new(),
                failures: AtomicU32::new(failures),
                calls: AtomicU32::new(0),
            }
        }

        fn trip(&self) -> GraphResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(GraphError::Connection("connection reset".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl GraphStore for FlakyStore {
        async fn upsert_documents(&self, documents: &[DocumentNode]) -> GraphResult<()> {
            self.trip()?;
            self.inner.upsert_documents(documents).await
        }

        async fn upsert_collection(&self, id: &str, title: Option<&str>) -> GraphResult<()> {
            self.trip()?;
            self.inner.upsert_collection(id, title).await
        }

        async fn link_document_to_documents(
            &self,
            origin: &str,
            destinations: &[String],
        ) -> GraphResult<()> {
            self.trip()?;
            self.inner.link_document_to_documents(origin, destinations).await
        }

        async fn link_documents_to_document(
            &self,
            origins: &[String],
            destination: &str,
        ) -> GraphResult<()> {
            self.trip()?;
            self.inner.link_documents_to_document(origins, destination).await
        }

        async fn link_collection_chapters(
            &self,
            collection_id: &str,
            chapters: &[ChapterNode],
        ) -> GraphResult<()> {
            self.trip()?;
            self.inner.link_collection_chapters(collection_id, chapters).await
        }

        async fn link_collections(&self, first: &str, second: &str) -> GraphResult<()> {
            self.trip()?;
            self.inner.link_collections(first, second).await
        }

        async fn count_nodes(&self) -> GraphResult<u64> {
            self.trip()?;
            self.inner.count_nodes().await
        }
    }

    fn fast_retry(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_millis(1))
    }

    fn node(id: &str) -> DocumentNode {
        DocumentNode::new(id, None)
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(400));
        assert_eq!(policy.delay_after(40), MAX_BACKOFF);
    }

    #[test]
    fn test_attempts_at_least_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).attempts, 1);
    }

    #[tokio::test]
    async fn test_persist_document_writes_nodes_and_edges() {
        let store = Arc::new(MemoryGraph::new());
        let writer = GraphWriter::new(store.clone(), fast_retry(1));

        let write = DocumentWrite {
            document: DocumentNode::new("p1", Some("Intro".to_string())),
            outgoing: vec![node("p2"), node("p3")],
            incoming: vec![node("p4")],
            collections: vec![("s1".to_string(), Some("Seq".to_string()))],
        };
        writer.persist_document(&write).await.unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.node_count(), 5);
        assert_eq!(snapshot.edge_count(EdgeKind::LinksTo), 3);
        assert!(snapshot.has_edge(
            &EntityKey::document("p4"),
            EdgeKind::LinksTo,
            &EntityKey::document("p1")
        ));
        assert!(snapshot.node(&EntityKey::collection("s1")).is_some());
    }

    #[tokio::test]
    async fn test_persist_document_twice_is_idempotent() {
        let store = Arc::new(MemoryGraph::new());
        let writer = GraphWriter::new(store.clone(), fast_retry(1));
        let write = DocumentWrite {
            document: node("a"),
            outgoing: vec![node("b")],
            incoming: Vec::new(),
            collections: Vec::new(),
        };

        writer.persist_document(&write).await.unwrap();
        let first = store.snapshot();
        writer.persist_document(&write).await.unwrap();
        assert_eq!(store.snapshot(), first);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let store = Arc::new(FlakyStore::new(2));
        let writer = GraphWriter::new(store.clone(), fast_retry(3));

        writer
            .persist_collection(&CollectionWrite {
                id: "s1".to_string(),
                title: None,
                chapters: vec![ChapterNode::new("a", None, 0)],
            })
            .await
            .unwrap();

        // two failures + one success for upsert_collection, one for the chapters
        assert_eq!(store.calls.load(Ordering::SeqCst), 4);
        assert!(store
            .inner
            .snapshot()
            .has_edge(
                &EntityKey::collection("s1"),
                EdgeKind::BeginsWith,
                &EntityKey::document("a")
            ));
    }

    #[tokio::test]
    async fn test_retries_exhausted_surfaces_error() {
        let store = Arc::new(FlakyStore::new(10));
        let writer = GraphWriter::new(store.clone(), fast_retry(3));

        let err = writer.stitch_collections("a", "b").await.unwrap_err();
        match err {
            GraphError::RetriesExhausted {
                operation,
                attempts,
                ..
            } => {
                assert_eq!(operation, "link_collections");
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }
}
