//! Graph store trait and error types

use crate::graph::{ChapterNode, DocumentNode};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during graph store operations
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Neo4j error: {0}")]
    Neo4j(#[from] neo4rs::Error),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Unexpected result: {0}")]
    UnexpectedResult(String),

    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<GraphError>,
    },
}

/// Result type for graph store operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Directed property-graph backend used by the crawler
///
/// Every write is an upsert: applying the same call twice leaves the graph
/// exactly as one application did. Link operations only connect nodes that
/// already exist; callers upsert the endpoints first.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Creates missing post nodes; titles follow the first-non-null rule
    async fn upsert_documents(&self, documents: &[DocumentNode]) -> GraphResult<()>;

    /// Creates the sequence node if missing
    async fn upsert_collection(&self, id: &str, title: Option<&str>) -> GraphResult<()>;

    /// Creates `origin -[LINKS_TO]-> destination` for every destination
    async fn link_document_to_documents(
        &self,
        origin: &str,
        destinations: &[String],
    ) -> GraphResult<()>;

    /// Creates `origin -[LINKS_TO]-> destination` for every origin
    async fn link_documents_to_document(
        &self,
        origins: &[String],
        destination: &str,
    ) -> GraphResult<()>;

    /// Writes a sequence's reading chain
    ///
    /// Upserts every chapter, stable-sorts them by order key, chains
    /// consecutive chapters with `CONTINUES_TO`, labels the first
    /// `SequenceStart` (reached by `BEGINS_WITH`) and the last `SequenceEnd`
    /// (reached by `ENDS_WITH`).
    async fn link_collection_chapters(
        &self,
        collection_id: &str,
        chapters: &[ChapterNode],
    ) -> GraphResult<()>;

    /// Chains the last post of `first` to the first post of `second`
    async fn link_collections(&self, first: &str, second: &str) -> GraphResult<()>;

    /// Counts every node in the graph
    async fn count_nodes(&self) -> GraphResult<u64>;
}
