use crate::ConfigError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

/// Main configuration structure for Postgraph
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub graph: GraphConfig,
    #[serde(default)]
    pub output: OutputConfig,
    pub seed: SeedConfig,
}

impl Config {
    /// The parsed site base URL
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.site.base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))
    }
}

/// Source site configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Origin of the site, e.g. "https://www.lesswrong.com"
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Extra headers sent with every request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Stop after this many entities have been visited
    #[serde(rename = "max-visits", default)]
    pub max_visits: Option<u32>,

    /// Per-fetch timeout (milliseconds)
    #[serde(rename = "request-timeout", default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Stop the run after this many seconds
    #[serde(rename = "run-deadline", default)]
    pub run_deadline: Option<u64>,

    /// Refetch every page instead of reusing pages fetched during link resolution
    #[serde(rename = "force-revisit", default)]
    pub force_revisit: bool,

    /// Enqueue the member posts of every visited sequence
    #[serde(rename = "expand-collections", default = "default_true")]
    pub expand_collections: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_visits: None,
            request_timeout: default_request_timeout(),
            run_deadline: None,
            force_revisit: false,
            expand_collections: true,
        }
    }
}

impl CrawlerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout)
    }

    pub fn run_deadline(&self) -> Option<Duration> {
        self.run_deadline.map(Duration::from_secs)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Format: CrawlerName/Version (+ContactURL; ContactEmail)
    pub fn user_agent_string(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Graph store connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    /// Bolt URI, e.g. "bolt://localhost:7687"
    pub uri: String,

    pub user: String,

    #[serde(default)]
    pub password: String,

    /// Attempts per store call before the write is reported failed
    #[serde(rename = "write-attempts", default = "default_write_attempts")]
    pub write_attempts: u32,

    /// Base delay between attempts (milliseconds), doubled each retry
    #[serde(rename = "retry-backoff", default = "default_retry_backoff")]
    pub retry_backoff: u64,
}

impl GraphConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff)
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// Path of the markdown run report
    #[serde(rename = "summary-path", default)]
    pub summary_path: Option<String>,
}

/// The post the crawl starts from
#[derive(Debug, Clone, Deserialize)]
pub struct SeedConfig {
    pub id: String,

    /// Title to use instead of the one found on the page
    #[serde(default)]
    pub title: Option<String>,
}

fn default_request_timeout() -> u64 {
    30_000
}

fn default_write_attempts() -> u32 {
    3
}

fn default_retry_backoff() -> u64 {
    500
}

fn default_true() -> bool {
    true
}
