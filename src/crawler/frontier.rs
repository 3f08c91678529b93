//! Crawl frontier: the work queue and the visited set of one crawl run
//!
//! This module handles:
//! - Canonicalizing and classifying discovered links
//! - First-in first-out queueing of (url, context) entries
//! - Visited-once semantics keyed by canonical URL
//! - Counting what happened to every link and fetch

use crate::tree::{NodeId, PageKind};
use crate::url::{canonicalize_url, IgnoreReason, UrlClass, UrlClassifier};
use std::collections::{HashSet, VecDeque};
use url::Url;

/// Why a page is queued and where its node lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlContext {
    /// Node reserved when the link was found; `None` for the start page,
    /// whose node already exists as the tree root
    pub node: Option<NodeId>,
    pub title: String,
    pub kind: PageKind,
}

impl CrawlContext {
    /// Context of the start page
    pub fn start(title: impl Into<String>) -> Self {
        Self {
            node: None,
            title: title.into(),
            kind: PageKind::LanguageRoot,
        }
    }
}

/// A queued page
#[derive(Debug, Clone)]
pub struct FrontierEntry {
    pub url: Url,
    pub context: CrawlContext,
}

/// Counters collected over one crawl run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStats {
    /// Fetch attempts, successful or not
    pub pages_fetched: u64,
    pub pages_failed: u64,
    /// Fetched pages whose content type did not fit their kind
    pub pages_mismatched: u64,
    pub links_enqueued: u64,
    pub links_duplicate: u64,
    pub links_ignored: u64,
    /// In-scope links of a kind the current handler does not follow
    pub links_skipped: u64,
    pub probes: u64,
    pub media_files: u64,
    /// True when the run stopped at the page limit with work left
    pub limit_reached: bool,
}

/// Work queue plus visited set, owned by one crawl run
pub struct Frontier {
    queue: VecDeque<FrontierEntry>,
    visited: HashSet<String>,
    classifier: UrlClassifier,
    stats: CrawlStats,
}

impl Frontier {
    pub fn new(classifier: UrlClassifier) -> Self {
        Self {
            queue: VecDeque::new(),
            visited: HashSet::new(),
            classifier,
            stats: CrawlStats::default(),
        }
    }

    /// Canonicalizes `raw` and classifies it
    ///
    /// Returns `None` for links that cannot be canonicalized.
    pub fn classify(&self, raw: &str) -> Option<(Url, UrlClass)> {
        match canonicalize_url(raw) {
            Ok(url) => {
                let class = self.classifier.classify(&url);
                Some((url, class))
            }
            Err(e) => {
                tracing::debug!("Skipping malformed link {}: {}", raw, e);
                None
            }
        }
    }

    /// Reason a canonical URL is out of scope, if any
    pub fn ignore_reason(&self, url: &Url) -> Option<IgnoreReason> {
        self.classifier.ignore_reason(url)
    }

    /// Queues `url` unless it was already visited or is ignored
    ///
    /// Rejection is silent apart from a debug log and a counter. Returns true
    /// if the entry was queued.
    pub fn enqueue(&mut self, url: Url, context: CrawlContext) -> bool {
        if !self.admit(&url) {
            return false;
        }
        self.push(url, context);
        true
    }

    /// Checks that `url` may be queued and marks it visited if so
    ///
    /// Handlers call this before reserving a node, then [`push`] the entry.
    ///
    /// [`push`]: Frontier::push
    pub fn admit(&mut self, url: &Url) -> bool {
        if let Some(reason) = self.classifier.ignore_reason(url) {
            tracing::debug!("Ignoring {} ({})", url, reason);
            self.stats.links_ignored += 1;
            return false;
        }
        if !self.mark_visited(url) {
            tracing::debug!("Already visited {}", url);
            self.stats.links_duplicate += 1;
            return false;
        }
        true
    }

    /// Queues an admitted entry
    pub fn push(&mut self, url: Url, context: CrawlContext) {
        tracing::debug!("Enqueued {} as {}", url, context.kind.as_str());
        self.stats.links_enqueued += 1;
        self.queue.push_back(FrontierEntry { url, context });
    }

    /// Records `url` as visited; returns false if it already was
    pub fn mark_visited(&mut self, url: &Url) -> bool {
        self.visited.insert(url.as_str().to_string())
    }

    pub fn is_visited(&self, url: &Url) -> bool {
        self.visited.contains(url.as_str())
    }

    pub fn pop(&mut self) -> Option<FrontierEntry> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn stats(&self) -> &CrawlStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut CrawlStats {
        &mut self.stats
    }

    pub fn into_stats(self) -> CrawlStats {
        self.stats
    }
}
