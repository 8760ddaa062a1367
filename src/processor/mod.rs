//! Content processor module
//!
//! Turns the raw pages written by the crawler into passage records: HTML is
//! reduced to plain text, boilerplate regions are dropped, whitespace is
//! normalised and the text is split into chunks. The passages of a page always
//! replace the ones stored for the same URL, so reprocessing never leaves
//! stale chunks behind.

mod chunking;
mod config;
mod error;
mod extraction;

pub use chunking::chunk_text;
pub use config::{ChunkOptions, ProcessorConfig, ProcessorConfigBuilder};
pub use error::ProcessError;
pub use extraction::{ContentExtractor, ExtractedPage, normalize_whitespace};

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::crawler::RawPage;
use crate::crawler::storage::{list_page_keys, load_page, page_key};
use crate::index::Database;
use crate::storage::ObjectStore;

/// A cleaned, chunked unit of page text used for retrieval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassageRecord {
    /// URL of the page the passage came from
    pub source_url: String,

    /// The passage text
    pub text: String,

    /// Position of the passage within its page, contiguous from 0
    pub chunk_index: u32,

    /// When the page was processed
    pub processed_at: DateTime<Utc>,

    /// Title of the page
    pub title: Option<String>,

    /// Description of the page
    pub description: Option<String>,
}

/// Which stored pages a processing run covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Drop every passage of the site, then process every page
    Full,

    /// Process pages fetched after their passages were last written
    Incremental,

    /// Process only the pages crawled from these URLs
    Urls(Vec<String>),
}

/// Outcome of a processing run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessReport {
    /// Pages considered by the run
    pub pages_seen: usize,

    /// Pages whose passages were (re)written
    pub pages_processed: usize,

    /// Pages left alone: skip patterns, unchanged since last run, not crawled
    pub pages_skipped: usize,

    /// Pages that could not be parsed
    pub pages_failed: usize,

    /// Passages written across all pages
    pub passages_written: usize,
}

/// Turn one raw page into its passage records
///
/// The result depends only on the page content and the configuration, apart
/// from the `processed_at` stamp supplied by the caller. An empty or
/// whitespace-only page yields no records.
pub fn process_page(
    page: &RawPage,
    config: &ProcessorConfig,
    processed_at: DateTime<Utc>,
) -> Result<Vec<PassageRecord>, ProcessError> {
    let extractor = ContentExtractor::new(&config.exclude_selectors);
    build_passages(&extractor, page, &config.chunk_options, processed_at)
}

fn build_passages(
    extractor: &ContentExtractor,
    page: &RawPage,
    options: &ChunkOptions,
    processed_at: DateTime<Utc>,
) -> Result<Vec<PassageRecord>, ProcessError> {
    if page.html.trim().is_empty() {
        return Ok(Vec::new());
    }

    let extracted = extractor.extract(&page.html)?;
    let chunks = chunk_text(&extracted.text(), options)?;

    chunks
        .into_iter()
        .enumerate()
        .map(|(index, text)| {
            let chunk_index = u32::try_from(index)
                .map_err(|_| ProcessError::Chunking(format!("Too many chunks in {}", page.url)))?;
            Ok(PassageRecord {
                source_url: page.url.clone(),
                text,
                chunk_index,
                processed_at,
                title: extracted.title.clone(),
                description: extracted.description.clone(),
            })
        })
        .collect()
}

/// Batch processor reading raw pages from an object store and writing
/// passages to the document store
pub struct Processor<S> {
    store: S,
    db: Database,
    config: ProcessorConfig,
    extractor: ContentExtractor,
}

impl<S: ObjectStore> Processor<S> {
    /// Create a processor
    pub fn new(store: S, db: Database, config: ProcessorConfig) -> Self {
        let extractor = ContentExtractor::new(&config.exclude_selectors);
        Self {
            store,
            db,
            config,
            extractor,
        }
    }

    /// Process the selected pages of `site`
    ///
    /// A page that cannot be parsed is logged, counted as failed and skipped.
    /// Object store or document store failures abort the run.
    #[instrument(skip(self))]
    pub async fn run(&self, site: &str, selection: &Selection) -> Result<ProcessReport, ProcessError> {
        self.config.chunk_options.validate()?;

        let keys = match selection {
            Selection::Full => {
                let dropped = self.db.drop_collection(site).await?;
                info!("Dropped {} existing passages for {}", dropped, site);
                list_page_keys(&self.store, site).await?
            }
            Selection::Incremental => list_page_keys(&self.store, site).await?,
            Selection::Urls(urls) => urls.iter().map(|url| page_key(site, url)).collect(),
        };
        info!("Processing {} pages for {}", keys.len(), site);

        let mut report = ProcessReport::default();
        for key in keys {
            report.pages_seen += 1;

            if self.config.is_skipped(&key) {
                debug!("Skipping {}: matches a skip pattern", key);
                report.pages_skipped += 1;
                continue;
            }

            let page = match load_page(&self.store, &key).await {
                Ok(Some(page)) => page,
                Ok(None) => {
                    warn!("Skipping {}: no crawled page", key);
                    report.pages_skipped += 1;
                    continue;
                }
                Err(e) if !e.is_fatal() => {
                    warn!("Skipping {}: {}", key, e);
                    report.pages_failed += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if *selection == Selection::Incremental {
                if let Some(processed_at) = self.db.source_processed_at(site, &page.url).await? {
                    if page.fetched_at <= processed_at {
                        debug!("Skipping {}: unchanged since {}", page.url, processed_at);
                        report.pages_skipped += 1;
                        continue;
                    }
                }
            }

            let records = match build_passages(
                &self.extractor,
                &page,
                &self.config.chunk_options,
                now_millis(),
            ) {
                Ok(records) => records,
                Err(e) if !e.is_fatal() => {
                    warn!("Skipping {}: {}", page.url, e);
                    report.pages_failed += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let written = self.db.replace_passages(site, &page.url, &records).await?;
            debug!("Wrote {} passages for {}", written, page.url);
            report.pages_processed += 1;
            report.passages_written += written;
        }

        info!(
            "Processed {} of {} pages ({} skipped, {} failed), {} passages written",
            report.pages_processed,
            report.pages_seen,
            report.pages_skipped,
            report.pages_failed,
            report.passages_written
        );
        Ok(report)
    }
}

/// Current time at the millisecond precision the document store keeps
fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}
