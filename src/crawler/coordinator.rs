//! Crawl coordinator - the main crawl loop of one language edition
//!
//! This module handles:
//! - Creating the tree root before anything is fetched
//! - Draining the frontier in FIFO order up to the page limit
//! - Sorting fetch outcomes into dispatch, mismatch and failure
//! - Handing the finished arena back as an owned tree

use crate::crawler::fetcher::{FetchResult, Fetcher};
use crate::crawler::frontier::{CrawlContext, CrawlStats, Frontier, FrontierEntry};
use crate::crawler::handlers::{CrawlSession, FetchedPage};
use crate::site::Language;
use crate::tree::{CrawlArena, CrawlNode, PageKind};
use crate::url::{canonicalize_url, UrlClassifier};
use crate::Result;
use std::sync::Arc;

/// How often (in pages) progress is logged
const PROGRESS_INTERVAL: u64 = 10;

/// Result of one crawl run
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    /// The raw tree, rooted at the start page
    pub tree: CrawlNode,
    pub stats: CrawlStats,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    fetcher: Arc<dyn Fetcher>,
    frontier: Frontier,
    language: Language,
}

impl Coordinator {
    /// Creates a coordinator for one language edition
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Fetch capability shared with the downloader
    /// * `classifier` - URL classifier built for `language`
    /// * `language` - The language edition being crawled
    pub fn new(fetcher: Arc<dyn Fetcher>, classifier: UrlClassifier, language: Language) -> Self {
        Self {
            fetcher,
            frontier: Frontier::new(classifier),
            language,
        }
    }

    /// Crawls from `start_url` until the frontier is empty or `limit` pages
    /// have been fetched
    ///
    /// The root node exists before the first fetch, so a limit of zero
    /// returns a tree holding only the root. Per-page failures are logged
    /// and counted; they never abort the run.
    ///
    /// # Arguments
    ///
    /// * `start_url` - The language entry page
    /// * `start_context` - Title and kind of the root node
    /// * `limit` - Maximum number of fetches
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlOutcome)` - The raw tree and run counters
    /// * `Err(HarvestError)` - The start URL could not be canonicalized
    pub async fn run(self, start_url: &str, start_context: CrawlContext, limit: usize) -> Result<CrawlOutcome> {
        let start = canonicalize_url(start_url)?;

        let mut root = CrawlNode::new(start.as_str(), start_context.kind, start_context.title.clone());
        root.language = Some(self.language);

        let mut session = CrawlSession {
            fetcher: self.fetcher,
            frontier: self.frontier,
            arena: CrawlArena::with_root(root),
            language: self.language,
        };

        tracing::info!("Starting {} crawl at {} (limit {})", self.language, start, limit);

        session.frontier.mark_visited(&start);
        let mut pending = Some(FrontierEntry {
            url: start,
            context: CrawlContext {
                node: None,
                ..start_context
            },
        });

        loop {
            let Some(entry) = pending.take().or_else(|| session.frontier.pop()) else {
                break;
            };

            let fetched = session.frontier.stats().pages_fetched;
            if fetched >= limit as u64 {
                tracing::warn!(
                    "Page limit {} reached with {} pages still queued",
                    limit,
                    session.frontier.len() + 1
                );
                session.frontier.stats_mut().limit_reached = true;
                break;
            }

            process_entry(&mut session, entry).await;

            let fetched = session.frontier.stats().pages_fetched;
            if fetched % PROGRESS_INTERVAL == 0 {
                tracing::info!(
                    "Progress: {} pages fetched, {} queued, {} nodes",
                    fetched,
                    session.frontier.len(),
                    session.arena.len()
                );
            }
        }

        let stats = session.frontier.into_stats();
        let tree = session.arena.into_tree();

        tracing::info!(
            "Finished {} crawl: {} pages fetched, {} failed, {} nodes",
            self.language,
            stats.pages_fetched,
            stats.pages_failed,
            tree.len()
        );

        Ok(CrawlOutcome { tree, stats })
    }
}

/// Fetches one entry and routes the outcome
async fn process_entry(session: &mut CrawlSession, entry: FrontierEntry) {
    session.frontier.stats_mut().pages_fetched += 1;
    let kind = entry.context.kind;

    match session.fetcher.get(entry.url.as_str()).await {
        FetchResult::Success {
            final_url,
            content_type,
            body,
            ..
        } => {
            let page = FetchedPage {
                url: entry.url.clone(),
                final_url,
                content_type,
                body: Some(body),
            };
            session.dispatch(entry, page).await;
        }

        FetchResult::ContentMismatch {
            content_type,
            final_url,
        } if kind == PageKind::Resource => {
            let page = FetchedPage {
                url: entry.url.clone(),
                final_url,
                content_type,
                body: None,
            };
            session.dispatch(entry, page).await;
        }

        FetchResult::ContentMismatch { content_type, .. } => {
            tracing::warn!(
                "Expected HTML for {} {} but got {}",
                kind.as_str(),
                entry.url,
                content_type
            );
            session.frontier.stats_mut().pages_mismatched += 1;
        }

        FetchResult::HttpError { status_code } => {
            tracing::error!("HTTP {} fetching {}", status_code, entry.url);
            session.frontier.stats_mut().pages_failed += 1;
        }

        FetchResult::NetworkError { error } => {
            tracing::error!("Network error fetching {}: {}", entry.url, error);
            session.frontier.stats_mut().pages_failed += 1;
        }
    }
}
