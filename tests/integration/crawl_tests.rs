//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for the site and the in-memory graph
//! store to check the graph a full crawl leaves behind. Mock expectations
//! (`expect(n)`) prove how often each page was fetched.

use postgraph::config::{load_config, Config};
use postgraph::crawler::{run_crawl, Coordinator};
use postgraph::graph::{EdgeKind, GraphSnapshot, MemoryGraph};
use postgraph::output::{CrawlReport, StopReason};
use postgraph::EntityKey;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Loads a config pointing at the mock server through the real loader
fn create_test_config(base_url: &str, crawler: &str) -> Config {
    let content = format!(
        r#"
[site]
base-url = "{base_url}"

[crawler]
request-timeout = 5000
{crawler}

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[graph]
uri = "bolt://localhost:7687"
user = "neo4j"
write-attempts = 1
retry-backoff = 1

[seed]
id = "p1"
title = "Intro"
"#
    );
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    load_config(file.path()).unwrap()
}

/// A post page in the site's template
fn post_page(title: &str, body_links: &[&str], pingbacks: &[&str]) -> String {
    post_page_in_sequence(title, body_links, pingbacks, None, None, None)
}

fn post_page_in_sequence(
    title: &str,
    body_links: &[&str],
    pingbacks: &[&str],
    sequence: Option<&str>,
    previous: Option<&str>,
    next: Option<&str>,
) -> String {
    let body: String = body_links
        .iter()
        .map(|href| format!(r#"<p>See <a href="{}">this</a>.</p>"#, href))
        .collect();
    let pings: String = pingbacks
        .iter()
        .map(|href| format!(r#"<a href="{}">ping</a>"#, href))
        .collect();
    let nav = sequence
        .map(|href| {
            format!(
                r#"<div class="PostsTopSequencesNav-title"><a href="{}">The Sequence</a></div>"#,
                href
            )
        })
        .unwrap_or_default();
    let prev = previous
        .map(|href| format!(r#"<a class="SequencesNavigationLink-prev" href="{}">prev</a>"#, href))
        .unwrap_or_default();
    let next = next
        .map(|href| format!(r#"<a class="SequencesNavigationLink-next" href="{}">next</a>"#, href))
        .unwrap_or_default();

    format!(
        r#"<html><body>
{nav}
<h1><a class="PostsPageTitle-link" href="/posts/self/slug">{title}</a></h1>
<div class="InlineReactSelectionWrapper-root">{body}</div>
<div class="PingbacksList-list">{pings}</div>
{prev}{next}
</body></html>"#
    )
}

/// A page reached through a pretty link; its title link names the canonical post
fn pretty_page(canonical_href: &str, title: &str) -> String {
    format!(
        r#"<html><body>
<h1><a class="PostsPageTitle-link" href="{canonical_href}">{title}</a></h1>
<div class="InlineReactSelectionWrapper-root"><p>No links.</p></div>
</body></html>"#
    )
}

fn sequence_page(title: &str, chapters: &[&str]) -> String {
    let items: String = chapters
        .iter()
        .map(|href| {
            format!(
                r#"<span class="PostsTitle-eaTitleDesktopEllipsis"><a href="{}">chapter</a></span>"#,
                href
            )
        })
        .collect();
    format!(
        r#"<html><body><div class="SequencesPage-content"><h1>{title}</h1>
<div class="ChaptersItem-posts">{items}</div></div></body></html>"#
    )
}

async fn mount_page(server: &MockServer, page_path: &str, body: String, times: u64) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(times)
        .mount(server)
        .await;
}

async fn crawl(config: Config) -> (CrawlReport, GraphSnapshot) {
    let graph = Arc::new(MemoryGraph::new());
    let report = run_crawl(config, graph.clone()).await.unwrap();
    (report, graph.snapshot())
}

/// How often the mock server has served `page_path` so far
async fn fetch_count(server: &MockServer, page_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == page_path)
        .count()
}

fn doc(id: &str) -> EntityKey {
    EntityKey::document(id)
}

fn seq(id: &str) -> EntityKey {
    EntityKey::collection(id)
}

#[tokio::test]
async fn test_seed_with_two_outgoing_links() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/posts/p1",
        post_page("Ignored Title", &["/posts/p2", "/posts/p3"], &[]),
        1,
    )
    .await;
    mount_page(&server, "/posts/p2", post_page("Second", &[], &[]), 1).await;
    mount_page(&server, "/posts/p3", post_page("Third", &[], &[]), 1).await;

    let (report, graph) = crawl(create_test_config(&server.uri(), "")).await;

    assert_eq!(report.visited_documents, 3);
    assert_eq!(report.visited_collections, 0);
    assert_eq!(report.stop_reason, Some(StopReason::FrontierExhausted));
    assert_eq!(report.frontier_remaining, 0);
    assert!(report.is_clean());

    assert_eq!(graph.node_count(), 3);
    assert_eq!(graph.edge_count(EdgeKind::LinksTo), 2);
    assert!(graph.has_edge(&doc("p1"), EdgeKind::LinksTo, &doc("p2")));
    assert!(graph.has_edge(&doc("p1"), EdgeKind::LinksTo, &doc("p3")));

    // The override title wins over the one on the page
    assert_eq!(
        graph.node(&doc("p1")).unwrap().title.as_deref(),
        Some("Intro")
    );
    assert_eq!(
        graph.node(&doc("p2")).unwrap().title.as_deref(),
        Some("Second")
    );
}

#[tokio::test]
async fn test_shared_neighbor_fetched_once() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/posts/p1",
        post_page("One", &["/posts/p2", "/posts/p3"], &[]),
        1,
    )
    .await;
    mount_page(&server, "/posts/p2", post_page("Two", &["/posts/p3"], &[]), 1).await;
    mount_page(&server, "/posts/p3", post_page("Three", &["/posts/p1"], &["/posts/p2"]), 1).await;

    let (report, graph) = crawl(create_test_config(&server.uri(), "")).await;

    assert_eq!(report.visited_documents, 3);
    assert_eq!(graph.node_count(), 3);
    assert_eq!(graph.edge_count(EdgeKind::LinksTo), 4);
    assert!(graph.has_edge(&doc("p2"), EdgeKind::LinksTo, &doc("p3")));
    assert!(graph.has_edge(&doc("p3"), EdgeKind::LinksTo, &doc("p1")));
}

#[tokio::test]
async fn test_pretty_link_page_is_reused() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/posts/p1",
        post_page("One", &["/s/seqA/p/xyz"], &[]),
        1,
    )
    .await;
    mount_page(
        &server,
        "/s/seqA/p/xyz",
        pretty_page("/posts/xyz/nice-title", "Nice Title"),
        1,
    )
    .await;
    // The canonical page is never requested: the visit uses the parked copy
    mount_page(&server, "/posts/xyz", post_page("Nice Title", &[], &[]), 0).await;

    let (report, graph) = crawl(create_test_config(&server.uri(), "")).await;

    assert_eq!(report.visited_documents, 2);
    assert!(report.is_clean());
    assert!(graph.has_edge(&doc("p1"), EdgeKind::LinksTo, &doc("xyz")));
    assert_eq!(
        graph.node(&doc("xyz")).unwrap().title.as_deref(),
        Some("Nice Title")
    );
}

#[tokio::test]
async fn test_force_revisit_bypasses_page_cache() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/posts/p1",
        post_page("One", &["/s/seqA/p/xyz"], &[]),
        1,
    )
    .await;
    mount_page(
        &server,
        "/s/seqA/p/xyz",
        pretty_page("/posts/xyz/nice-title", "Nice Title"),
        1,
    )
    .await;
    mount_page(&server, "/posts/xyz", post_page("Nice Title", &[], &[]), 1).await;

    let (report, _) = crawl(create_test_config(&server.uri(), "force-revisit = true")).await;
    assert_eq!(report.visited_documents, 2);
}

#[tokio::test]
async fn test_failing_link_is_skipped_and_reported() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/posts/p1",
        post_page("One", &["/lw/broken", "/posts/p2"], &[]),
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/lw/broken"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/posts/p2", post_page("Two", &[], &[]), 1).await;

    let (report, graph) = crawl(create_test_config(&server.uri(), "")).await;

    assert_eq!(report.visited_documents, 2);
    assert!(report.failed_visits.is_empty());
    assert_eq!(report.skipped_links.len(), 1);
    assert!(report.skipped_links[0].link.ends_with("/lw/broken"));
    assert_eq!(report.skipped_links[0].found_on, doc("p1"));

    assert_eq!(graph.node_count(), 2);
    assert_eq!(graph.edge_count(EdgeKind::LinksTo), 1);
}

#[tokio::test]
async fn test_failed_visit_does_not_stop_the_run() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/posts/p1",
        post_page("One", &["/posts/gone", "/posts/p2"], &[]),
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/posts/gone"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/posts/p2", post_page("Two", &[], &[]), 1).await;

    let (report, graph) = crawl(create_test_config(&server.uri(), "")).await;

    assert_eq!(report.visited_documents, 2);
    assert_eq!(report.failed_visits.len(), 1);
    assert_eq!(report.failed_visits[0].key, doc("gone"));
    // The canonical link needed no fetch, so the edge is still written
    assert!(graph.has_edge(&doc("p1"), EdgeKind::LinksTo, &doc("gone")));
}

#[tokio::test]
async fn test_visit_ceiling_stops_the_run() {
    let server = MockServer::start().await;
    mount_page(&server, "/posts/p1", post_page("One", &["/posts/p2"], &[]), 1).await;
    mount_page(&server, "/posts/p2", post_page("Two", &["/posts/p3"], &[]), 1).await;
    mount_page(&server, "/posts/p3", post_page("Three", &[], &[]), 0).await;

    let (report, graph) = crawl(create_test_config(&server.uri(), "max-visits = 2")).await;

    assert_eq!(report.visited_documents, 2);
    assert_eq!(report.stop_reason, Some(StopReason::VisitCeiling));
    assert_eq!(report.frontier_remaining, 1);
    assert!(graph.has_edge(&doc("p2"), EdgeKind::LinksTo, &doc("p3")));
}

#[tokio::test]
async fn test_sequence_chapters_are_chained() {
    let server = MockServer::start().await;
    mount_page(&server, "/posts/p1", post_page("One", &["/s/seqA"], &[]), 1).await;
    mount_page(
        &server,
        "/s/seqA",
        sequence_page(
            "Sequence A",
            &["/s/seqA/p/d1", "/s/seqA/p/d2", "/posts/d3/third"],
        ),
        1,
    )
    .await;
    mount_page(&server, "/s/seqA/p/d1", pretty_page("/posts/d1/first", "First"), 1).await;
    mount_page(&server, "/s/seqA/p/d2", pretty_page("/posts/d2/second", "Second"), 1).await;
    mount_page(&server, "/posts/d1", post_page("First", &[], &[]), 0).await;
    mount_page(&server, "/posts/d2", post_page("Second", &[], &[]), 0).await;
    mount_page(&server, "/posts/d3", post_page("Third", &[], &[]), 1).await;

    let (report, graph) = crawl(create_test_config(&server.uri(), "")).await;

    assert_eq!(report.visited_collections, 1);
    assert_eq!(report.visited_documents, 4);
    assert!(report.is_clean());

    assert_eq!(
        graph.node(&seq("seqA")).unwrap().title.as_deref(),
        Some("Sequence A")
    );
    assert!(graph.has_edge(&doc("d1"), EdgeKind::ContinuesTo, &doc("d2")));
    assert!(graph.has_edge(&doc("d2"), EdgeKind::ContinuesTo, &doc("d3")));
    assert_eq!(graph.edge_count(EdgeKind::ContinuesTo), 2);
    assert!(graph.has_edge(&seq("seqA"), EdgeKind::BeginsWith, &doc("d1")));
    assert!(graph.has_edge(&seq("seqA"), EdgeKind::EndsWith, &doc("d3")));
    assert!(graph.has_label(&doc("d1"), "SequenceStart"));
    assert!(graph.has_label(&doc("d3"), "SequenceEnd"));
}

#[tokio::test]
async fn test_sequence_members_not_expanded_when_disabled() {
    let server = MockServer::start().await;
    mount_page(&server, "/posts/p1", post_page("One", &["/s/seqA"], &[]), 1).await;
    mount_page(
        &server,
        "/s/seqA",
        sequence_page("Sequence A", &["/posts/d1", "/posts/d2"]),
        1,
    )
    .await;
    mount_page(&server, "/posts/d1", post_page("First", &[], &[]), 0).await;
    mount_page(&server, "/posts/d2", post_page("Second", &[], &[]), 0).await;

    let (report, graph) =
        crawl(create_test_config(&server.uri(), "expand-collections = false")).await;

    assert_eq!(report.visited_documents, 1);
    assert_eq!(report.visited_collections, 1);
    assert!(graph.has_edge(&doc("d1"), EdgeKind::ContinuesTo, &doc("d2")));
}

#[tokio::test]
async fn test_consecutive_sequences_are_stitched() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/posts/a1",
        post_page_in_sequence("A1", &["/s/seqA", "/s/seqB"], &[], Some("/s/seqA"), None, Some("/posts/a2")),
        1,
    )
    .await;
    mount_page(
        &server,
        "/posts/a2",
        post_page_in_sequence("A2", &[], &[], Some("/s/seqA"), Some("/posts/a1"), Some("/posts/b1")),
        1,
    )
    .await;
    mount_page(
        &server,
        "/posts/b1",
        post_page_in_sequence("B1", &[], &[], Some("/s/seqB"), Some("/posts/a2"), Some("/posts/b2")),
        1,
    )
    .await;
    mount_page(
        &server,
        "/posts/b2",
        post_page_in_sequence("B2", &[], &[], Some("/s/seqB"), Some("/posts/b1"), None),
        1,
    )
    .await;
    mount_page(&server, "/s/seqA", sequence_page("A", &["/posts/a1", "/posts/a2"]), 1).await;
    mount_page(&server, "/s/seqB", sequence_page("B", &["/posts/b1", "/posts/b2"]), 1).await;

    let graph = Arc::new(MemoryGraph::new());
    let mut coordinator =
        Coordinator::new(create_test_config(&server.uri(), ""), graph.clone()).unwrap();
    coordinator.seed("a1", None);
    let report = coordinator.run().await.unwrap();
    let graph = graph.snapshot();

    assert_eq!(report.visited_documents, 4);
    assert_eq!(report.visited_collections, 2);
    assert_eq!(
        report.stitches_applied,
        vec![("seqA".to_string(), "seqB".to_string())]
    );

    assert!(graph.has_edge(&doc("a2"), EdgeKind::ContinuesTo, &doc("b1")));
    assert!(!graph.has_edge(&doc("b1"), EdgeKind::ContinuesTo, &doc("a2")));
    assert_eq!(graph.edge_count(EdgeKind::ContinuesTo), 3);
}

#[tokio::test]
async fn test_site_pages_that_are_not_posts_stay_out_of_the_graph() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/posts/p1",
        post_page(
            "One",
            &["/library", "/about", "/w/some-concept", "/posts/p2"],
            &[],
        ),
        1,
    )
    .await;
    mount_page(&server, "/library", "<html><h1>Library</h1></html>".to_string(), 0).await;
    mount_page(&server, "/about", "<html><h1>About</h1></html>".to_string(), 0).await;
    mount_page(&server, "/w/some-concept", "<html><h1>Concept</h1></html>".to_string(), 0).await;
    mount_page(&server, "/posts/p2", post_page("Two", &[], &[]), 1).await;

    let (report, graph) = crawl(create_test_config(&server.uri(), "")).await;

    assert_eq!(report.visited_documents, 2);
    assert!(report.is_clean());
    assert_eq!(graph.node_count(), 2);
    assert!(graph.node(&doc("library")).is_none());
    assert!(graph.node(&doc("about")).is_none());
    assert!(graph.node(&doc("some-concept")).is_none());
    assert_eq!(graph.edge_count(EdgeKind::LinksTo), 1);
    assert!(graph.has_edge(&doc("p1"), EdgeKind::LinksTo, &doc("p2")));
}

#[tokio::test]
async fn test_run_deadline_fails_the_visit_in_flight() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/posts/p1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(post_page("One", &["/posts/p2"], &[]))
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/posts/p2", post_page("Two", &[], &[]), 0).await;

    let (report, graph) = crawl(create_test_config(&server.uri(), "run-deadline = 1")).await;

    assert_eq!(report.stop_reason, Some(StopReason::Deadline));
    assert_eq!(report.visited_documents, 0);
    assert_eq!(report.failed_visits.len(), 1);
    assert_eq!(report.failed_visits[0].key, doc("p1"));
    assert!(report.failed_visits[0].reason.contains("deadline"));
    assert_eq!(graph.node_count(), 0);
}

#[tokio::test]
async fn test_requested_revisit_fetches_the_page_again() {
    let server = MockServer::start().await;
    mount_page(&server, "/posts/p1", post_page("One", &["/posts/p2"], &[]), 2).await;
    mount_page(&server, "/posts/p2", post_page("Two", &[], &[]), 1).await;

    let graph = Arc::new(MemoryGraph::new());
    let mut coordinator =
        Coordinator::new(create_test_config(&server.uri(), ""), graph.clone()).unwrap();
    coordinator.seed("p1", None);

    let first = coordinator.run().await.unwrap();
    assert_eq!(first.visited_documents, 2);
    assert_eq!(fetch_count(&server, "/posts/p1").await, 1);

    // A finished run does not touch the post again on its own
    let idle = coordinator.run().await.unwrap();
    assert_eq!(idle.visited_documents, 0);
    assert_eq!(fetch_count(&server, "/posts/p1").await, 1);

    coordinator.request_revisit(doc("p1"));
    let second = coordinator.run().await.unwrap();

    assert_eq!(second.visited_documents, 1);
    assert_eq!(second.stop_reason, Some(StopReason::FrontierExhausted));
    assert_eq!(fetch_count(&server, "/posts/p1").await, 2);
    assert!(graph
        .snapshot()
        .has_edge(&doc("p1"), EdgeKind::LinksTo, &doc("p2")));
}

#[tokio::test]
async fn test_self_link_does_not_park_the_page_being_visited() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/posts/p1",
        post_page("One", &["/s/seqA/p/p1", "/posts/p2"], &[]),
        1,
    )
    .await;
    mount_page(&server, "/s/seqA/p/p1", pretty_page("/posts/p1/one", "One"), 1).await;
    mount_page(&server, "/posts/p2", post_page("Two", &[], &[]), 1).await;

    let graph = Arc::new(MemoryGraph::new());
    let mut coordinator =
        Coordinator::new(create_test_config(&server.uri(), ""), graph.clone()).unwrap();
    coordinator.seed("p1", None);
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.visited_documents, 2);
    assert_eq!(coordinator.registry().parked_pages(), 0);
    let graph = graph.snapshot();
    assert!(!graph.has_edge(&doc("p1"), EdgeKind::LinksTo, &doc("p1")));
    assert_eq!(graph.edge_count(EdgeKind::LinksTo), 1);
}
