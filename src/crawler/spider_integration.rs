//! Integration with spider library for web crawling

use futures::{Stream, StreamExt, stream};
use spider::tokio::sync::broadcast::error::RecvError;
use spider::website::Website;
use tracing::{Instrument, debug, info, info_span, instrument, warn};
use url::Url;

use crate::crawler::error::CrawlError;
use crate::crawler::storage::store_page;
use crate::crawler::{CrawlerConfig, RawPage};
use crate::storage::{ObjectStore, validate_key};

/// Outcome of a crawl
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    /// Pages written to the object store
    pub stored: usize,

    /// Pages that could not be fetched and were skipped
    pub skipped: usize,
}

/// Crawl a website and store every fetched page as a `RawPage`
///
/// # Arguments
///
/// * `site` - Site identifier, used as the storage namespace
/// * `start_url` - Where the crawl begins; only links on the same host are followed
/// * `config` - The crawler configuration
/// * `store` - Object store receiving the raw pages
///
/// # Returns
///
/// A report of stored and skipped pages. A failed fetch only skips that page;
/// a failed write to the object store stops the crawl and fails it.
#[instrument(skip(config, store))]
pub async fn crawl_site<S>(
    site: &str,
    start_url: &str,
    config: &CrawlerConfig,
    store: &S,
) -> Result<CrawlReport, CrawlError>
where
    S: ObjectStore + Clone + 'static,
{
    validate_key(&format!("pages/{site}"))?;
    let parsed = Url::parse(start_url)?;
    if parsed.host_str().is_none() {
        return Err(CrawlError::MissingHost(start_url.to_string()));
    }

    info!("Starting crawl of {} for {}", start_url, site);
    debug!("Crawler config: {:?}", config);

    let mut website = Website::new(start_url);
    website
        .configuration
        .with_respect_robots_txt(config.respect_robots_txt)
        .with_user_agent(Some(&config.user_agent))
        .with_delay(config.delay_ms)
        .with_depth(config.max_depth.try_into().unwrap_or(usize::MAX))
        .with_limit(config.max_pages)
        .with_subdomains(config.follow_subdomains);

    let rx = website
        .subscribe(64)
        .ok_or_else(|| CrawlError::Other("Failed to subscribe to website".to_string()))?;

    let pages = stream::unfold(rx, |mut rx| async move {
        let fetched = match rx.recv().await {
            Ok(page) => Fetched::Page {
                url: page.get_url().to_string(),
                status: page.status_code.as_u16(),
                html: page.get_html(),
            },
            Err(RecvError::Lagged(missed)) => Fetched::Dropped(missed),
            Err(RecvError::Closed) => return None,
        };
        Some((fetched, rx))
    });
    let mut handle = tokio::spawn(persist_pages(Box::pin(pages), store.clone(), site.to_string()));

    // A failed write ends the receiver early; stop crawling instead of fetching pages nobody stores
    let stopped_early = {
        let crawl = website.crawl();
        tokio::select! {
            _ = crawl => None,
            joined = &mut handle => Some(joined),
        }
    };

    let joined = match stopped_early {
        Some(joined) => {
            warn!("Crawl stopped before completion");
            joined
        }
        None => {
            info!("Crawl finished");
            website.unsubscribe();
            handle.await
        }
    };

    let report = joined.map_err(|e| CrawlError::Other(format!("Task join error: {}", e)))??;
    info!(
        "Stored {} pages, skipped {} pages",
        report.stored, report.skipped
    );
    Ok(report)
}

/// What the crawler hands over for one fetch
#[derive(Debug, Clone, PartialEq)]
enum Fetched {
    Page { url: String, status: u16, html: String },
    /// Pages lost because the receiver fell behind
    Dropped(u64),
}

/// Store successful pages as they arrive
///
/// Non-success responses, empty bodies and dropped pages are counted as
/// skipped. The first failed write ends the run with `Err`.
async fn persist_pages<P, S>(
    mut pages: P,
    store: S,
    site: String,
) -> Result<CrawlReport, CrawlError>
where
    P: Stream<Item = Fetched> + Unpin,
    S: ObjectStore,
{
    let mut report = CrawlReport::default();

    while let Some(fetched) = pages.next().await {
        let (url, status, html) = match fetched {
            Fetched::Page { url, status, html } => (url, status, html),
            Fetched::Dropped(missed) => {
                warn!("Dropped {} pages while the store was busy", missed);
                report.skipped += missed as usize;
                continue;
            }
        };

        if !(200..300).contains(&status) {
            warn!("Skipping {}: HTTP {}", url, status);
            report.skipped += 1;
            continue;
        }

        if html.trim().is_empty() {
            warn!("Skipping {}: empty response body", url);
            report.skipped += 1;
            continue;
        }

        let span = info_span!("store_page", url = %url);
        store_page(&store, &site, &RawPage::new(url, html))
            .instrument(span)
            .await?;
        report.stored += 1;
    }

    Ok(report)
}
