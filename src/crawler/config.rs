//! # Crawler Configuration Module
//!
//! Politeness and scope controls for a crawl, with a builder for the CLI.
//! The defaults follow a conservative production crawl: depth 4, robots.txt
//! honoured, a short delay between requests and a browser user agent.

use std::time::Duration;

/// User agent sent with every request
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36";

/// Configuration for the crawler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlerConfig {
    /// Maximum link depth from the start URL
    pub max_depth: u32,

    /// Maximum number of pages to fetch
    pub max_pages: u32,

    /// Delay in milliseconds between requests
    pub delay_ms: u64,

    /// Whether to respect robots.txt
    pub respect_robots_txt: bool,

    /// Whether links to subdomains of the start host are followed
    pub follow_subdomains: bool,

    /// User agent to use for requests
    pub user_agent: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: 4,
            max_pages: 500,
            delay_ms: 250,
            respect_robots_txt: true,
            follow_subdomains: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Builder for CrawlerConfig
#[derive(Debug, Default)]
pub struct CrawlerConfigBuilder {
    config: CrawlerConfig,
}

impl CrawlerConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: CrawlerConfig::default(),
        }
    }

    /// Set the maximum depth to crawl
    pub fn max_depth(mut self, max_depth: u32) -> Self {
        self.config.max_depth = max_depth;
        self
    }

    /// Set the maximum number of pages to crawl
    pub fn max_pages(mut self, max_pages: u32) -> Self {
        self.config.max_pages = max_pages;
        self
    }

    /// Set the delay in milliseconds between requests
    pub fn delay_ms(mut self, delay_ms: u64) -> Self {
        self.config.delay_ms = delay_ms;
        self
    }

    /// Set whether to respect robots.txt
    pub fn respect_robots_txt(mut self, respect_robots_txt: bool) -> Self {
        self.config.respect_robots_txt = respect_robots_txt;
        self
    }

    /// Set whether subdomains are followed
    pub fn follow_subdomains(mut self, follow_subdomains: bool) -> Self {
        self.config.follow_subdomains = follow_subdomains;
        self
    }

    /// Set the user agent to use for requests
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Build the configuration
    pub fn build(self) -> CrawlerConfig {
        self.config
    }
}

impl CrawlerConfig {
    /// Create a new builder
    pub fn builder() -> CrawlerConfigBuilder {
        CrawlerConfigBuilder::new()
    }

    /// Get the request delay as a Duration
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}
