//! Output module for crawl reports
//!
//! This module handles:
//! - The run report produced by the coordinator
//! - Printing reports and graph statistics to stdout
//! - Writing markdown summaries

mod markdown;
mod report;
pub mod stats;

pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use report::{CrawlReport, EntityFailure, SkippedLink, StopReason};
pub use stats::{load_statistics, print_report, print_statistics, GraphStatistics};

use thiserror::Error;

/// Errors from writing output files
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
