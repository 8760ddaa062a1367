//! # Website Crawler Module
//!
//! This module is the first stage of the pipeline. It walks a company website
//! and writes every fetched page, untouched, to the object store as a `RawPage`.
//! Nothing downstream is notified; the processor picks the pages up later.
//!
//! ## Key Components
//!
//! - `CrawlerConfig`: depth, politeness and page limits for a crawl
//! - `RawPage`: one fetched page (URL, HTML, fetch time)
//! - `crawl_site`: crawl a site and persist its pages
//! - `storage`: the object key layout and JSON encoding of raw pages
//!
//! ## Features
//!
//! - Same-domain link following up to a configured depth
//! - Respects robots.txt and a delay between requests
//! - Failed fetches are logged and skipped without aborting the crawl
//! - Re-crawls overwrite the previous raw page for the same URL

mod config;
mod error;
mod spider_integration;
pub mod storage;

pub use config::{CrawlerConfig, CrawlerConfigBuilder};
pub use error::CrawlError;
pub use spider_integration::{CrawlReport, crawl_site};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A page exactly as fetched from the website
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPage {
    /// URL of the page
    pub url: String,

    /// Response body
    #[serde(alias = "content")]
    pub html: String,

    /// When the page was fetched
    #[serde(default)]
    pub fetched_at: DateTime<Utc>,
}

impl RawPage {
    /// Create a page fetched now
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
            fetched_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_page_json_layout() {
        let page = RawPage {
            url: "https://ex.com/about".to_string(),
            html: "<p>We build tools.</p>".to_string(),
            fetched_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        };

        let json: serde_json::Value = serde_json::to_value(&page).unwrap();
        assert_eq!(json["url"], "https://ex.com/about");
        assert_eq!(json["html"], "<p>We build tools.</p>");
        assert!(json["fetched_at"].as_str().unwrap().starts_with("2023-11-14"));
    }

    #[test]
    fn test_raw_page_accepts_legacy_layout() {
        // Objects written as {url, content} without a fetch time
        let page: RawPage =
            serde_json::from_str(r#"{"url": "http://test.url", "content": "<div><p>Test content</p></div>"}"#)
                .unwrap();

        assert_eq!(page.url, "http://test.url");
        assert_eq!(page.html, "<div><p>Test content</p></div>");
        assert_eq!(page.fetched_at, DateTime::<Utc>::default());
    }
}
