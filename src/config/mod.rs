//! Configuration module for Postgraph
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use postgraph::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("postgraph.toml")).unwrap();
//! println!("Crawl starts at post {}", config.seed.id);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, GraphConfig, OutputConfig, SeedConfig, SiteConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, PASSWORD_ENV};
