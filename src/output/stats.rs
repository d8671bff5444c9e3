//! Console output for run reports and graph statistics

use crate::graph::{GraphResult, GraphStore};
use crate::output::report::CrawlReport;

/// Size of the graph as reported by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphStatistics {
    pub total_nodes: u64,
}

/// Loads statistics from the graph store
pub async fn load_statistics(store: &dyn GraphStore) -> GraphResult<GraphStatistics> {
    Ok(GraphStatistics {
        total_nodes: store.count_nodes().await?,
    })
}

/// Prints graph statistics to stdout
pub fn print_statistics(stats: &GraphStatistics) {
    println!("=== Graph Statistics ===\n");
    println!("  Total nodes: {}", stats.total_nodes);
}

/// Prints a run report to stdout
pub fn print_report(report: &CrawlReport) {
    println!("=== Crawl Report ===\n");

    println!("Run:");
    println!("  Seed: {}", report.seed);
    println!("  Started: {}", report.started_at);
    if let Some(finished) = report.finished_at {
        println!("  Finished: {}", finished);
    }
    if let Some(duration) = report.duration_seconds() {
        println!("  Duration: {}s", duration);
    }
    if let Some(reason) = report.stop_reason {
        println!("  Stopped: {}", reason);
    }
    if let Some(hash) = &report.config_hash {
        println!("  Config hash: {}", hash);
    }
    println!();

    println!("Visits:");
    println!("  Posts: {}", report.visited_documents);
    println!("  Sequences: {}", report.visited_collections);
    println!("  Left in frontier: {}", report.frontier_remaining);
    println!("  Sequence stitches: {}", report.stitches_applied.len());
    println!();

    if !report.failed_visits.is_empty() {
        println!("Failed Visits ({}):", report.failed_visits.len());
        for failure in &report.failed_visits {
            println!("  - {}: {}", failure.key, failure.reason);
        }
        println!();
    }

    if !report.failed_persists.is_empty() {
        println!("Failed Writes ({}):", report.failed_persists.len());
        for failure in &report.failed_persists {
            println!("  - {}: {}", failure.key, failure.reason);
        }
        println!();
    }

    if !report.skipped_links.is_empty() {
        println!("Skipped Links ({}):", report.skipped_links.len());
        for skipped in &report.skipped_links {
            println!(
                "  - {} (on {}): {}",
                skipped.link, skipped.found_on, skipped.reason
            );
        }
        println!();
    }
}
