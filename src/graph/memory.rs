//! In-memory graph store
//!
//! Mirrors the Neo4j write semantics (MERGE on id, first-non-null titles,
//! MATCH-only link endpoints) so crawl behavior can be checked without a
//! database.

use crate::entity::EntityKey;
use crate::graph::traits::{GraphResult, GraphStore};
use crate::graph::{
    ChapterChain, ChapterNode, DocumentNode, EdgeKind, COLLECTION_END_LABEL, COLLECTION_LABEL,
    COLLECTION_START_LABEL, DOCUMENT_LABEL,
};
use crate::registry::lock;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

/// Properties and labels of one stored node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeData {
    pub labels: BTreeSet<&'static str>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub curated: bool,
}

/// A point-in-time copy of the whole graph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphSnapshot {
    pub nodes: BTreeMap<EntityKey, NodeData>,
    pub edges: BTreeSet<(EntityKey, EdgeKind, EntityKey)>,
}

impl GraphSnapshot {
    /// Number of nodes of every kind
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges of one relationship type
    pub fn edge_count(&self, kind: EdgeKind) -> usize {
        self.edges.iter().filter(|(_, k, _)| *k == kind).count()
    }

    /// Returns true if the edge `from -[kind]-> to` exists
    pub fn has_edge(&self, from: &EntityKey, kind: EdgeKind, to: &EntityKey) -> bool {
        self.edges.contains(&(from.clone(), kind, to.clone()))
    }

    /// All edges of one relationship type as (from id, to id)
    pub fn edges_of(&self, kind: EdgeKind) -> Vec<(String, String)> {
        self.edges
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(from, _, to)| (from.id.clone(), to.id.clone()))
            .collect()
    }

    pub fn node(&self, key: &EntityKey) -> Option<&NodeData> {
        self.nodes.get(key)
    }

    pub fn has_label(&self, key: &EntityKey, label: &str) -> bool {
        self.nodes
            .get(key)
            .map(|n| n.labels.contains(label))
            .unwrap_or(false)
    }

    fn merge_document(&mut self, id: &str, title: Option<&str>) -> &mut NodeData {
        let node = self
            .nodes
            .entry(EntityKey::document(id))
            .or_insert_with(|| NodeData {
                labels: BTreeSet::from([DOCUMENT_LABEL]),
                ..NodeData::default()
            });
        if node.title.is_none() {
            node.title = title.map(str::to_string);
        }
        node
    }

    fn merge_collection(&mut self, id: &str, title: Option<&str>) -> &mut NodeData {
        let node = self
            .nodes
            .entry(EntityKey::collection(id))
            .or_insert_with(|| NodeData {
                labels: BTreeSet::from([COLLECTION_LABEL]),
                ..NodeData::default()
            });
        if node.title.is_none() {
            node.title = title.map(str::to_string);
        }
        node
    }

    /// MERGE an edge, but only between nodes that exist (MATCH semantics)
    fn merge_edge(&mut self, from: EntityKey, kind: EdgeKind, to: EntityKey) {
        if self.nodes.contains_key(&from) && self.nodes.contains_key(&to) {
            self.edges.insert((from, kind, to));
        }
    }

    /// Follows a single outgoing edge of `kind` from `from`
    fn target_of(&self, from: &EntityKey, kind: EdgeKind) -> Vec<EntityKey> {
        self.edges
            .iter()
            .filter(|(f, k, _)| f == from && *k == kind)
            .map(|(_, _, to)| to.clone())
            .collect()
    }
}

/// Graph store that keeps everything in process memory
#[derive(Debug, Default)]
pub struct MemoryGraph {
    state: Mutex<GraphSnapshot>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies the current graph
    pub fn snapshot(&self) -> GraphSnapshot {
        lock(&self.state).clone()
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn upsert_documents(&self, documents: &[DocumentNode]) -> GraphResult<()> {
        let mut state = lock(&self.state);
        for doc in documents {
            let node = state.merge_document(&doc.id, doc.title.as_deref());
            if node.url.is_none() {
                node.url = doc.url.clone();
            }
            node.curated |= doc.curated;
        }
        Ok(())
    }

    async fn upsert_collection(&self, id: &str, title: Option<&str>) -> GraphResult<()> {
        lock(&self.state).merge_collection(id, title);
        Ok(())
    }

    async fn link_document_to_documents(
        &self,
        origin: &str,
        destinations: &[String],
    ) -> GraphResult<()> {
        let mut state = lock(&self.state);
        for destination in destinations {
            state.merge_edge(
                EntityKey::document(origin),
                EdgeKind::LinksTo,
                EntityKey::document(destination.as_str()),
            );
        }
        Ok(())
    }

    async fn link_documents_to_document(
        &self,
        origins: &[String],
        destination: &str,
    ) -> GraphResult<()> {
        let mut state = lock(&self.state);
        for origin in origins {
            state.merge_edge(
                EntityKey::document(origin.as_str()),
                EdgeKind::LinksTo,
                EntityKey::document(destination),
            );
        }
        Ok(())
    }

    async fn link_collection_chapters(
        &self,
        collection_id: &str,
        chapters: &[ChapterNode],
    ) -> GraphResult<()> {
        let chain = ChapterChain::build(chapters);
        let mut state = lock(&self.state);

        for chapter in &chain.sorted {
            state.merge_document(&chapter.id, chapter.title.as_deref());
        }

        let (Some(first), Some(last)) = (chain.first(), chain.last()) else {
            return Ok(());
        };

        state.merge_collection(collection_id, None);
        let collection = EntityKey::collection(collection_id);

        let first_key = EntityKey::document(first.id.as_str());
        state.merge_document(&first.id, None).labels.insert(COLLECTION_START_LABEL);
        state.merge_edge(collection.clone(), EdgeKind::BeginsWith, first_key);

        let last_key = EntityKey::document(last.id.as_str());
        state.merge_document(&last.id, None).labels.insert(COLLECTION_END_LABEL);
        state.merge_edge(collection, EdgeKind::EndsWith, last_key);

        for (from, to) in &chain.pairs {
            state.merge_edge(
                EntityKey::document(from.as_str()),
                EdgeKind::ContinuesTo,
                EntityKey::document(to.as_str()),
            );
        }

        Ok(())
    }

    async fn link_collections(&self, first: &str, second: &str) -> GraphResult<()> {
        let mut state = lock(&self.state);
        let ends = state.target_of(&EntityKey::collection(first), EdgeKind::EndsWith);
        let begins = state.target_of(&EntityKey::collection(second), EdgeKind::BeginsWith);

        for last in &ends {
            for start in &begins {
                state.merge_edge(last.clone(), EdgeKind::ContinuesTo, start.clone());
            }
        }
        Ok(())
    }

    async fn count_nodes(&self) -> GraphResult<u64> {
        Ok(lock(&self.state).node_count() as u64)
    }
}
