//! Postgraph main entry point
//!
//! This is the command-line interface for the Postgraph post and sequence crawler.

use anyhow::{bail, Context};
use clap::Parser;
use postgraph::config::{load_config_with_hash, Config};
use postgraph::crawler::Coordinator;
use postgraph::graph::{EdgeKind, GraphStore, MemoryGraph, Neo4jStore};
use postgraph::output::{
    generate_markdown_summary, load_statistics, print_report, print_statistics, CrawlReport,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Postgraph: crawls posts and sequences into a link graph
///
/// Postgraph starts at a seed post, follows body links and pingbacks,
/// resolves every link to a canonical post or sequence and writes the
/// entities and their relationships into Neo4j.
#[derive(Parser, Debug)]
#[command(name = "postgraph")]
#[command(version)]
#[command(about = "Crawls posts and sequences into a link graph", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Start from this post id instead of the configured seed
    #[arg(long, value_name = "ID")]
    seed: Option<String>,

    /// Title to record for the seed post
    #[arg(long, value_name = "TITLE")]
    seed_title: Option<String>,

    /// Refetch every page instead of reusing pages fetched during link resolution
    #[arg(long)]
    force_revisit: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "memory_graph"])]
    dry_run: bool,

    /// Show statistics from the graph store and exit
    #[arg(long, conflicts_with_all = ["dry_run", "memory_graph"])]
    stats: bool,

    /// Crawl into an in-memory graph instead of Neo4j
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    memory_graph: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    apply_overrides(&mut config, &cli)?;

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config).await?;
    } else if cli.memory_graph {
        handle_memory_crawl(config, config_hash).await?;
    } else {
        handle_crawl(config, config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("postgraph=info,warn"),
            1 => EnvFilter::new("postgraph=debug,info"),
            2 => EnvFilter::new("postgraph=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Applies command-line seed and revisit overrides to the loaded config
fn apply_overrides(config: &mut Config, cli: &Cli) -> anyhow::Result<()> {
    if let Some(seed) = &cli.seed {
        let seed = seed.trim();
        if seed.is_empty() || seed.contains('/') {
            bail!("--seed must be a bare post id, got '{}'", seed);
        }
        config.seed.id = seed.to_string();
        config.seed.title = None;
    }
    if let Some(title) = &cli.seed_title {
        config.seed.title = Some(title.clone());
    }
    if cli.force_revisit {
        config.crawler.force_revisit = true;
    }
    Ok(())
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Postgraph Dry Run ===\n");

    println!("Site:");
    println!("  Base URL: {}", config.site.base_url);
    println!("  Extra headers: {}", config.site.headers.len());

    println!("\nCrawler Configuration:");
    match config.crawler.max_visits {
        Some(max) => println!("  Max visits: {}", max),
        None => println!("  Max visits: unlimited"),
    }
    println!("  Request timeout: {}ms", config.crawler.request_timeout);
    match config.crawler.run_deadline {
        Some(secs) => println!("  Run deadline: {}s", secs),
        None => println!("  Run deadline: none"),
    }
    println!("  Force revisit: {}", config.crawler.force_revisit);
    println!("  Expand sequences: {}", config.crawler.expand_collections);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.user_agent_string());

    println!("\nGraph Store:");
    println!("  URI: {}", config.graph.uri);
    println!("  User: {}", config.graph.user);
    println!(
        "  Write attempts: {} (backoff {}ms)",
        config.graph.write_attempts, config.graph.retry_backoff
    );

    println!("\nOutput:");
    match &config.output.summary_path {
        Some(path) => println!("  Summary: {}", path),
        None => println!("  Summary: none"),
    }

    println!("\n✓ Configuration is valid");
    match &config.seed.title {
        Some(title) => println!("✓ Would start crawling at post {} ({})", config.seed.id, title),
        None => println!("✓ Would start crawling at post {}", config.seed.id),
    }
}

async fn connect_graph(config: &Config) -> anyhow::Result<Neo4jStore> {
    Neo4jStore::connect(&config.graph.uri, &config.graph.user, &config.graph.password)
        .await
        .with_context(|| format!("Failed to connect to graph store at {}", config.graph.uri))
}

/// Handles the --stats mode: shows statistics from the graph store
async fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Graph store: {}\n", config.graph.uri);

    let store = connect_graph(config).await?;
    let stats = load_statistics(&store).await?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --memory-graph mode: crawls without a database
async fn handle_memory_crawl(config: Config, config_hash: String) -> anyhow::Result<()> {
    let graph = Arc::new(MemoryGraph::new());
    let report = run(config, config_hash, graph.clone()).await?;

    let snapshot = graph.snapshot();
    println!("In-memory graph:");
    println!("  Nodes: {}", snapshot.node_count());
    for kind in [
        EdgeKind::LinksTo,
        EdgeKind::ContinuesTo,
        EdgeKind::BeginsWith,
        EdgeKind::EndsWith,
    ] {
        println!("  {} edges: {}", kind.as_str(), snapshot.edge_count(kind));
    }

    finish(&report);
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: String) -> anyhow::Result<()> {
    let store = Arc::new(connect_graph(&config).await?);
    let report = run(config, config_hash, store).await?;
    finish(&report);
    Ok(())
}

async fn run(
    config: Config,
    config_hash: String,
    store: Arc<dyn GraphStore>,
) -> anyhow::Result<CrawlReport> {
    let summary_path = config.output.summary_path.clone();
    let seed_id = config.seed.id.clone();
    let seed_title = config.seed.title.clone();

    tracing::info!("Seed post: {}", seed_id);

    let mut coordinator = Coordinator::new(config, store)?.with_config_hash(config_hash);
    coordinator.seed(&seed_id, seed_title.as_deref());
    let report = coordinator.run().await.context("Crawl failed")?;

    print_report(&report);

    if let Some(path) = summary_path {
        generate_markdown_summary(&report, Path::new(&path))
            .with_context(|| format!("Failed to write summary to {}", path))?;
        println!("✓ Summary written to: {}", path);
    }

    Ok(report)
}

fn finish(report: &CrawlReport) {
    if report.is_clean() {
        tracing::info!("Crawl completed successfully");
    } else {
        tracing::warn!(
            "Crawl completed with {} failed visits, {} failed writes and {} skipped links",
            report.failed_visits.len(),
            report.failed_persists.len(),
            report.skipped_links.len()
        );
    }
}
