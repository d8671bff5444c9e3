//! Crawler module: traversal, fetching, extraction and link resolution
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with a shared client
//! - Content extraction from post and sequence pages
//! - Resolution of raw links to canonical posts and sequences
//! - The breadth-first frontier and visited set
//! - Overall crawl coordination

mod coordinator;
mod extractor;
mod fetcher;
mod resolver;
mod scheduler;

pub use coordinator::{run_crawl, Coordinator};
pub use extractor::{
    CollectionExtraction, ContentExtractor, DocumentExtraction, ExtractError, HtmlExtractor,
    TitleProbe,
};
pub use fetcher::{build_http_client, FetchError, Fetcher};
pub use resolver::{LinkResolver, ResolveError, ResolvedLink};
pub use scheduler::Scheduler;
