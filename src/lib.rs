//! Postgraph: a post and sequence crawler that writes a link graph
//!
//! This crate follows hyperlinks outward from a seed post, resolves every
//! discovered link to a canonical post or sequence, and persists the entities
//! and their relationships into a directed graph store.

pub mod config;
pub mod crawler;
pub mod entity;
pub mod graph;
pub mod output;
pub mod registry;
pub mod url;

use thiserror::Error;

/// Main error type for Postgraph operations
#[derive(Debug, Error)]
pub enum PostgraphError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Extraction error: {0}")]
    Extract(#[from] crawler::ExtractError),

    #[error("Link resolution error: {0}")]
    Resolve(#[from] crawler::ResolveError),

    #[error("Graph store error: {0}")]
    Graph(#[from] graph::GraphError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Link points outside the site: {0}")]
    ForeignDomain(String),

    #[error("Link is not a post or sequence: {0}")]
    Excluded(String),
}

/// Result type alias for Postgraph operations
pub type Result<T> = std::result::Result<T, PostgraphError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use entity::{Collection, Document, EntityKey, EntityKind};
pub use graph::{GraphStore, MemoryGraph};
pub use registry::Registry;
