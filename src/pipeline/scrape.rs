//! Scrape stage: read every monitored site through the oracle's
//! URL-context mode, bounded and individually timed out.
//!
//! Only successful reads produce content; the per-run tally keeps the
//! distinction between plain failures and timeouts for the summary.

use tracing::{info, instrument, warn};

use crate::config::{Config, Site};
use crate::models::ScrapedContent;
use crate::oracle::Oracle;
use crate::runner::run_all;

/// Per-run scrape accounting.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeStats {
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
}

#[instrument(skip_all, fields(sites = config.sites.len()))]
pub async fn scrape_sites(
    oracle: &dyn Oracle,
    config: &Config,
) -> (Vec<ScrapedContent>, ScrapeStats) {
    let sites = config.sites.clone();
    let results = run_all(
        sites.clone(),
        config.max_concurrent_scrapes,
        Some(config.scrape_timeout),
        |_, site| async move { oracle.read_page(&site.url).await },
    )
    .await;

    let mut stats = ScrapeStats::default();
    let mut contents = Vec::new();
    for (site, result) in sites.iter().zip(results) {
        match result {
            Ok(text) => {
                stats.succeeded += 1;
                contents.push(ScrapedContent {
                    url: site.url.clone(),
                    title: extract_title(&text, site),
                    content: text,
                    source_name: site.name.clone(),
                    source_category: site.category.clone(),
                });
            }
            Err(error) if error.is_timeout() => {
                stats.timed_out += 1;
                warn!(site = %site.name, "scrape timed out");
            }
            Err(error) => {
                stats.failed += 1;
                warn!(site = %site.name, %error, "scrape failed");
            }
        }
    }

    info!(
        succeeded = stats.succeeded,
        failed = stats.failed,
        timed_out = stats.timed_out,
        "scrape completed"
    );
    (contents, stats)
}

/// First line of the extracted markdown, stripped of heading markers.
/// Falls back to the site URL when the content starts blank.
fn extract_title(content: &str, site: &Site) -> String {
    let first_line = content
        .lines()
        .next()
        .map(|line| line.replace('#', "").trim().to_string())
        .unwrap_or_default();
    if first_line.is_empty() {
        site.url.clone()
    } else {
        first_line
    }
}
