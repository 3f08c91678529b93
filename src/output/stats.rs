//! Per-language crawl statistics
//!
//! This module collects what one language run produced (node counts by kind,
//! nodes left for manual review, frontier counters) and prints it.

use crate::crawler::CrawlStats;
use crate::site::Language;
use crate::tree::{CanonicalNode, RestructureReport, UnknownNode};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Statistics of one language run
#[derive(Debug, Clone)]
pub struct LanguageReport {
    pub language: Language,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub config_hash: String,

    /// Nodes in the raw tree
    pub raw_nodes: usize,

    /// Nodes in the canonical tree
    pub canonical_nodes: usize,

    /// Canonical node count per kind tag
    pub kind_counts: BTreeMap<String, usize>,

    /// Nodes the restructurer could not classify
    pub unknown: Vec<UnknownNode>,

    pub backlinks_removed: usize,
    pub sections_removed: usize,

    pub crawl: CrawlStats,
}

impl LanguageReport {
    /// Builds the report of a finished crawl stage
    ///
    /// # Arguments
    ///
    /// * `raw_nodes` - Size of the raw tree before restructuring
    /// * `canonical` - The canonical tree
    /// * `restructure` - What the restructuring passes did
    /// * `crawl` - Frontier counters
    pub fn new(
        language: Language,
        started_at: DateTime<Utc>,
        config_hash: impl Into<String>,
        raw_nodes: usize,
        canonical: &CanonicalNode,
        restructure: RestructureReport,
        crawl: CrawlStats,
    ) -> Self {
        let mut kind_counts = BTreeMap::new();
        for node in canonical.iter() {
            *kind_counts.entry(node.kind.as_str().to_string()).or_insert(0) += 1;
        }

        Self {
            language,
            started_at,
            finished_at: Utc::now(),
            config_hash: config_hash.into(),
            raw_nodes,
            canonical_nodes: canonical.len(),
            kind_counts,
            unknown: restructure.unknown,
            backlinks_removed: restructure.backlinks_removed,
            sections_removed: restructure.sections_removed,
            crawl,
        }
    }

    /// Share of fetched pages that produced a node, in percent
    pub fn success_rate(&self) -> f64 {
        if self.crawl.pages_fetched == 0 {
            return 0.0;
        }
        let ok = self
            .crawl
            .pages_fetched
            .saturating_sub(self.crawl.pages_failed + self.crawl.pages_mismatched);
        (ok as f64 / self.crawl.pages_fetched as f64) * 100.0
    }

    pub fn duration_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.kind_counts.get(kind).copied().unwrap_or(0)
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `report` - The statistics to display
pub fn print_statistics(report: &LanguageReport) {
    println!("=== {} Crawl Statistics ===\n", report.language.profile().channel_title);

    println!("Overview:");
    println!("  Pages fetched: {}", report.crawl.pages_fetched);
    println!("  Raw nodes: {}", report.raw_nodes);
    println!("  Canonical nodes: {}", report.canonical_nodes);
    if report.crawl.limit_reached {
        println!("  Page limit reached: tree is partial");
    }
    println!();

    println!("Nodes by Kind:");
    let mut kinds: Vec<_> = report.kind_counts.iter().collect();
    kinds.sort_by(|a, b| b.1.cmp(a.1));
    for (kind, count) in kinds {
        println!("  {}: {}", kind, count);
    }
    println!();

    println!("Links:");
    println!("  Enqueued: {}", report.crawl.links_enqueued);
    println!("  Duplicates: {}", report.crawl.links_duplicate);
    println!("  Ignored: {}", report.crawl.links_ignored);
    println!("  Skipped: {}", report.crawl.links_skipped);
    println!("  Probes: {}", report.crawl.probes);
    println!();

    if !report.unknown.is_empty() {
        println!("Unknown Kinds ({}):", report.unknown.len());
        for node in &report.unknown {
            println!("  - {} {} ({})", node.kind, node.url, node.title);
        }
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} failed, {} mismatched of {} fetched)",
        report.success_rate(),
        report.crawl.pages_failed,
        report.crawl.pages_mismatched,
        report.crawl.pages_fetched
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UnknownKindPolicy;
    use crate::tree::{normalize_tree, to_canonical, CrawlNode, PageKind};

    fn report() -> LanguageReport {
        let mut tree = CrawlNode::new(
            "http://www.open.edu/openlearncreate/course/view.php?id=2042",
            PageKind::LanguageRoot,
            "TESSA (EN)",
        )
        .with_child(
            CrawlNode::new(
                "http://www.open.edu/openlearncreate/mod/subpage/view.php?id=1",
                PageKind::Subpage,
                "Literacy",
            )
            .with_child(CrawlNode::new(
                "http://www.open.edu/openlearncreate/mod/oucontent/view.php?id=2",
                PageKind::Oucontent,
                "Module 1",
            ))
            .with_child(CrawlNode::new(
                "http://www.open.edu/openlearncreate/mod/oucontent/view.php?id=3",
                PageKind::Oucontent,
                "Module 2",
            )),
        );
        let raw_nodes = tree.len();
        let restructured = normalize_tree(&mut tree, Language::En);
        let canonical = to_canonical(&tree, UnknownKindPolicy::Exclude).unwrap();
        let crawl = CrawlStats {
            pages_fetched: 10,
            pages_failed: 1,
            pages_mismatched: 1,
            ..CrawlStats::default()
        };
        LanguageReport::new(Language::En, Utc::now(), "abc123", raw_nodes, &canonical, restructured, crawl)
    }

    #[test]
    fn test_kind_counts() {
        let report = report();
        assert_eq!(report.canonical_nodes, 4);
        assert_eq!(report.count("content_module"), 2);
        assert_eq!(report.count("subpage_topic"), 1);
        assert_eq!(report.count("pdf_document"), 0);
    }

    #[test]
    fn test_success_rate() {
        let report = report();
        assert!((report.success_rate() - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_success_rate_without_fetches() {
        let mut report = report();
        report.crawl = CrawlStats::default();
        assert_eq!(report.success_rate(), 0.0);
    }
}
