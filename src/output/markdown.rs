//! Markdown crawl report
//!
//! One section per language run: overview, node counts by kind, link
//! counters and the nodes surfaced for manual review.

use crate::output::stats::LanguageReport;
use crate::Result;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Canonical kinds always listed in the kind table, in this order
const KIND_ROWS: &[(&str, &str)] = &[
    ("language_tree", "Language Tree"),
    ("subpage_topic", "Subpage Topic"),
    ("content_page", "Content Page"),
    ("content_module", "Content Module"),
    ("audio_resource", "Audio Resource"),
    ("pdf_document", "PDF Document"),
    ("unsupported_format", "Unsupported Format"),
    ("unclassified", "Unclassified"),
];

/// Writes the markdown report of `reports` to `output_path`
///
/// # Arguments
///
/// * `reports` - One report per language run
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote the report
/// * `Err(HarvestError)` - Failed to write the report
pub fn write_markdown_report(reports: &[LanguageReport], output_path: &Path) -> Result<()> {
    let markdown = format_markdown_report(reports);

    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats language reports as markdown
pub fn format_markdown_report(reports: &[LanguageReport]) -> String {
    let mut md = String::new();

    md.push_str("# TESSA Crawl Report\n\n");

    for report in reports {
        format_language(&mut md, report);
    }

    md
}

fn format_language(md: &mut String, report: &LanguageReport) {
    let profile = report.language.profile();
    md.push_str(&format!("## {}\n\n", profile.channel_title));

    md.push_str("### Run Information\n\n");
    md.push_str(&format!("- **Language**: {}\n", report.language));
    md.push_str(&format!("- **Channel Source ID**: {}\n", profile.channel_source_id));
    md.push_str(&format!("- **Started**: {}\n", report.started_at.to_rfc3339()));
    md.push_str(&format!("- **Finished**: {}\n", report.finished_at.to_rfc3339()));
    md.push_str(&format!("- **Duration**: {} seconds\n", report.duration_seconds()));
    md.push_str(&format!("- **Config Hash**: {}\n", report.config_hash));
    if report.crawl.limit_reached {
        md.push_str("- **Page Limit Reached**: yes (partial tree)\n");
    }
    md.push('\n');

    md.push_str("### Overall Statistics\n\n");
    md.push_str(&format!("- **Pages Fetched**: {}\n", report.crawl.pages_fetched));
    md.push_str(&format!("- **Pages Failed**: {}\n", report.crawl.pages_failed));
    md.push_str(&format!("- **Content Mismatches**: {}\n", report.crawl.pages_mismatched));
    md.push_str(&format!("- **Raw Nodes**: {}\n", report.raw_nodes));
    md.push_str(&format!("- **Canonical Nodes**: {}\n", report.canonical_nodes));
    md.push_str(&format!("- **Back-links Removed**: {}\n", report.backlinks_removed));
    md.push_str(&format!("- **Sections Removed**: {}\n", report.sections_removed));
    md.push_str(&format!("- **Success Rate**: {:.2}%\n\n", report.success_rate()));

    md.push_str("### Nodes by Kind\n\n");
    md.push_str("| Kind | Count |\n");
    md.push_str("|------|-------|\n");
    for (tag, label) in KIND_ROWS {
        md.push_str(&format!("| {} | {} |\n", label, report.count(tag)));
    }
    md.push('\n');

    md.push_str("### Links\n\n");
    md.push_str("| Outcome | Count |\n");
    md.push_str("|---------|-------|\n");
    md.push_str(&format!("| Enqueued | {} |\n", report.crawl.links_enqueued));
    md.push_str(&format!("| Duplicate | {} |\n", report.crawl.links_duplicate));
    md.push_str(&format!("| Ignored | {} |\n", report.crawl.links_ignored));
    md.push_str(&format!("| Skipped | {} |\n", report.crawl.links_skipped));
    md.push_str(&format!("| Probed | {} |\n", report.crawl.probes));
    md.push_str(&format!("| Media Files | {} |\n\n", report.crawl.media_files));

    if !report.unknown.is_empty() {
        md.push_str("### Unknown Kinds (manual review)\n\n");
        md.push_str("| Kind | Title | URL |\n");
        md.push_str("|------|-------|-----|\n");
        for node in &report.unknown {
            md.push_str(&format!("| {} | {} | {} |\n", node.kind, node.title, node.url));
        }
        md.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::CrawlStats;
    use crate::site::Language;
    use crate::tree::UnknownNode;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn create_test_report() -> LanguageReport {
        let mut kind_counts = BTreeMap::new();
        kind_counts.insert("language_tree".to_string(), 1);
        kind_counts.insert("content_module".to_string(), 42);
        LanguageReport {
            language: Language::Fr,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            config_hash: "abc123".to_string(),
            raw_nodes: 60,
            canonical_nodes: 43,
            kind_counts,
            unknown: vec![UnknownNode {
                url: "http://www.open.edu/openlearncreate/mod/forum/view.php?id=1".to_string(),
                kind: "forum".to_string(),
                title: "Forum".to_string(),
            }],
            backlinks_removed: 3,
            sections_removed: 5,
            crawl: CrawlStats {
                pages_fetched: 50,
                links_enqueued: 49,
                limit_reached: true,
                ..CrawlStats::default()
            },
        }
    }

    #[test]
    fn test_format_markdown_report() {
        let markdown = format_markdown_report(&[create_test_report()]);

        assert!(markdown.contains("# TESSA Crawl Report"));
        assert!(markdown.contains("## TESSA (FR)"));
        assert!(markdown.contains("tessa_africa_fr"));
        assert!(markdown.contains("Config Hash**: abc123"));
        assert!(markdown.contains("Page Limit Reached"));
    }

    #[test]
    fn test_markdown_kind_table() {
        let markdown = format_markdown_report(&[create_test_report()]);

        assert!(markdown.contains("| Content Module | 42 |"));
        assert!(markdown.contains("| PDF Document | 0 |"));
        assert!(markdown.contains("| Enqueued | 49 |"));
    }

    #[test]
    fn test_markdown_unknown_kinds() {
        let markdown = format_markdown_report(&[create_test_report()]);
        assert!(markdown.contains("Unknown Kinds"));
        assert!(markdown.contains("| forum | Forum |"));

        let mut clean = create_test_report();
        clean.unknown.clear();
        assert!(!format_markdown_report(&[clean]).contains("Unknown Kinds"));
    }

    #[test]
    fn test_write_markdown_report() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("reports/crawl_report.md");
        write_markdown_report(&[create_test_report()], &path).unwrap();
        assert!(std::fs::read_to_string(path).unwrap().starts_with("# TESSA Crawl Report"));
    }
}
