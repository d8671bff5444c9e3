//! Neo4j graph store over Bolt

use crate::graph::traits::{GraphError, GraphResult, GraphStore};
use crate::graph::{ChapterChain, ChapterNode, DocumentNode};
use async_trait::async_trait;
use neo4rs::{query, BoltBoolean, BoltMap, BoltNull, BoltString, BoltType, ConfigBuilder, Graph};

/// Graph store backed by a Neo4j (or Memgraph) server
#[derive(Clone)]
pub struct Neo4jStore {
    graph: Graph,
}

impl Neo4jStore {
    /// Connects with the given credentials
    pub async fn connect(uri: &str, user: &str, password: &str) -> GraphResult<Self> {
        let config = ConfigBuilder::default()
            .uri(uri)
            .user(user)
            .password(password)
            .fetch_size(500)
            .max_connections(10)
            .build()
            .map_err(|e| GraphError::Connection(e.to_string()))?;
        let graph = Graph::connect(config).await?;
        tracing::info!("Connected to graph store at {}", uri);
        Ok(Self { graph })
    }
}

fn bolt_str(value: &str) -> BoltType {
    BoltType::String(BoltString::from(value))
}

fn bolt_opt_str(value: Option<&str>) -> BoltType {
    match value {
        Some(v) => bolt_str(v),
        None => BoltType::Null(BoltNull),
    }
}

fn document_map(doc: &DocumentNode) -> BoltType {
    BoltType::Map(BoltMap::from_iter(vec![
        (BoltString::from("id"), bolt_str(&doc.id)),
        (BoltString::from("title"), bolt_opt_str(doc.title.as_deref())),
        (BoltString::from("url"), bolt_opt_str(doc.url.as_deref())),
        (
            BoltString::from("curated"),
            BoltType::Boolean(BoltBoolean::new(doc.curated)),
        ),
    ]))
}

fn pair_map(from: &str, to: &str) -> BoltType {
    BoltType::Map(BoltMap::from_iter(vec![
        (BoltString::from("from"), bolt_str(from)),
        (BoltString::from("to"), bolt_str(to)),
    ]))
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn upsert_documents(&self, documents: &[DocumentNode]) -> GraphResult<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let rows: Vec<BoltType> = documents.iter().map(document_map).collect();
        let q = query(
            "UNWIND $documents AS doc
             MERGE (n:Post {id: doc.id})
             ON CREATE SET n.title = doc.title, n.url = doc.url, n.curated = doc.curated
             ON MATCH SET n.title = coalesce(n.title, doc.title),
                          n.url = coalesce(n.url, doc.url),
                          n.curated = coalesce(n.curated, false) OR doc.curated",
        )
        .param("documents", rows);

        self.graph.run(q).await?;
        Ok(())
    }

    async fn upsert_collection(&self, id: &str, title: Option<&str>) -> GraphResult<()> {
        let q = query(
            "MERGE (s:Sequence {id: $id})
             ON CREATE SET s.title = $title
             ON MATCH SET s.title = coalesce(s.title, $title)",
        )
        .param("id", id)
        .param("title", bolt_opt_str(title));

        self.graph.run(q).await?;
        Ok(())
    }

    async fn link_document_to_documents(
        &self,
        origin: &str,
        destinations: &[String],
    ) -> GraphResult<()> {
        if destinations.is_empty() {
            return Ok(());
        }

        let q = query(
            "MATCH (origin:Post {id: $origin_id})
             UNWIND $destinations AS destination_id
             MATCH (destination:Post {id: destination_id})
             MERGE (origin)-[:LINKS_TO]->(destination)",
        )
        .param("origin_id", origin)
        .param("destinations", destinations.to_vec());

        self.graph.run(q).await?;
        Ok(())
    }

    async fn link_documents_to_document(
        &self,
        origins: &[String],
        destination: &str,
    ) -> GraphResult<()> {
        if origins.is_empty() {
            return Ok(());
        }

        let q = query(
            "MATCH (destination:Post {id: $destination_id})
             UNWIND $origins AS origin_id
             MATCH (origin:Post {id: origin_id})
             MERGE (origin)-[:LINKS_TO]->(destination)",
        )
        .param("destination_id", destination)
        .param("origins", origins.to_vec());

        self.graph.run(q).await?;
        Ok(())
    }

    async fn link_collection_chapters(
        &self,
        collection_id: &str,
        chapters: &[ChapterNode],
    ) -> GraphResult<()> {
        let chain = ChapterChain::build(chapters);
        let (Some(first), Some(last)) = (chain.first(), chain.last()) else {
            return Ok(());
        };

        let nodes: Vec<DocumentNode> = chain
            .sorted
            .iter()
            .map(|c| DocumentNode::new(c.id.clone(), c.title.clone()))
            .collect();
        self.upsert_documents(&nodes).await?;

        let q = query(
            "MERGE (s:Sequence {id: $sequence_id})
             WITH s
             MATCH (first:Post {id: $first_id})
             SET first:SequenceStart
             MERGE (s)-[:BEGINS_WITH]->(first)
             WITH s
             MATCH (last:Post {id: $last_id})
             SET last:SequenceEnd
             MERGE (s)-[:ENDS_WITH]->(last)",
        )
        .param("sequence_id", collection_id)
        .param("first_id", first.id.as_str())
        .param("last_id", last.id.as_str());
        self.graph.run(q).await?;

        if chain.pairs.is_empty() {
            return Ok(());
        }

        let pairs: Vec<BoltType> = chain
            .pairs
            .iter()
            .map(|(from, to)| pair_map(from, to))
            .collect();
        let q = query(
            "UNWIND $pairs AS pair
             MATCH (a:Post {id: pair.from})
             MATCH (b:Post {id: pair.to})
             MERGE (a)-[:CONTINUES_TO]->(b)",
        )
        .param("pairs", pairs);
        self.graph.run(q).await?;

        Ok(())
    }

    async fn link_collections(&self, first: &str, second: &str) -> GraphResult<()> {
        let q = query(
            "MATCH (s1:Sequence {id: $first_id})-[:ENDS_WITH]->(lastPost:Post)
             MATCH (s2:Sequence {id: $second_id})-[:BEGINS_WITH]->(firstPost:Post)
             MERGE (lastPost)-[:CONTINUES_TO]->(firstPost)",
        )
        .param("first_id", first)
        .param("second_id", second);

        self.graph.run(q).await?;
        Ok(())
    }

    async fn count_nodes(&self) -> GraphResult<u64> {
        let q = query("MATCH (n) RETURN count(n) AS num_of_nodes");
        let mut stream = self.graph.execute(q).await?;
        match stream.next().await? {
            Some(row) => Ok(row.get::<i64>("num_of_nodes").unwrap_or(0).max(0) as u64),
            None => Err(GraphError::UnexpectedResult(
                "node count query returned no rows".to_string(),
            )),
        }
    }
}
