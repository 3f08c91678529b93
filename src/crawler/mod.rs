//! Crawler module for fetching and walking one language edition of the site
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with an optional response cache
//! - HTML parsing, link extraction and label splitting
//! - The frontier with visited-once semantics
//! - Per-kind page handlers
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod frontier;
mod handlers;
mod parser;

pub use coordinator::{Coordinator, CrawlOutcome};
pub use fetcher::{build_http_client, is_html, FetchResult, Fetcher, HttpFetcher, ProbeResult};
pub use frontier::{CrawlContext, CrawlStats, Frontier, FrontierEntry};
pub use handlers::{handler_for, DescriptionRule, FetchedPage, Grouping, Handler, Region};
pub use parser::{find_region, normalize_text, page_title, resolve_link, split_link_label, Anchor, LinkLabel};

#[cfg(test)]
pub(crate) use fetcher::testing;

use crate::config::Config;
use crate::site::Language;
use crate::url::UrlClassifier;
use crate::Result;
use std::sync::Arc;

/// Crawls one language edition with the settings in `config`
///
/// The classifier is built from the site configuration, the start page is
/// the language's entry URL and the root is titled with the channel title.
///
/// # Arguments
///
/// * `config` - The harvester configuration
/// * `language` - Language edition to crawl
/// * `fetcher` - Fetch capability
/// * `limit` - Maximum number of fetches
///
/// # Returns
///
/// * `Ok(CrawlOutcome)` - The raw tree and run counters
/// * `Err(HarvestError)` - The configuration could not produce a classifier
///
/// # Example
///
/// ```no_run
/// use tessa_harvest::config::load_config;
/// use tessa_harvest::crawler::{build_http_client, crawl_language, HttpFetcher};
/// use tessa_harvest::Language;
/// use std::path::Path;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("harvest.toml"))?;
/// let client = build_http_client(&config.user_agent, config.crawler.request_timeout)?;
/// let fetcher = Arc::new(HttpFetcher::new(client));
/// let outcome = crawl_language(&config, Language::En, fetcher, config.crawler.page_limit).await?;
/// println!("{} nodes", outcome.tree.len());
/// # Ok(())
/// # }
/// ```
pub async fn crawl_language(
    config: &Config,
    language: Language,
    fetcher: Arc<dyn Fetcher>,
    limit: usize,
) -> Result<CrawlOutcome> {
    let classifier = UrlClassifier::new(&config.site, language, &config.entry_urls())?;
    let start_url = config.entry_url(language);
    let context = CrawlContext::start(language.profile().channel_title);

    Coordinator::new(fetcher, classifier, language)
        .run(&start_url, context, limit)
        .await
}
