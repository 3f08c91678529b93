//! Integration tests for the crawl stage
//!
//! These tests serve a small TESSA edition from wiremock and run the crawl,
//! restructuring and tree persistence end-to-end.

use crate::support::*;
use tessa_harvest::config::UnknownKindPolicy;
use tessa_harvest::crawler::crawl_language;
use tessa_harvest::output::{read_canonical_tree, write_canonical_tree, write_raw_tree, LanguageReport};
use tessa_harvest::tree::{normalize_tree, to_canonical};
use tessa_harvest::{CanonicalKind, Language};
use tempfile::TempDir;
use wiremock::MockServer;

#[tokio::test]
async fn test_full_crawl_builds_raw_tree() {
    let mock_server = MockServer::start().await;
    mount_site(&mock_server).await;
    let base_url = mock_server.uri();

    let tmp = TempDir::new().unwrap();
    let config = create_test_config(&base_url, tmp.path());
    let fetcher = create_fetcher(&config);

    let outcome = crawl_language(&config, Language::En, fetcher, config.crawler.page_limit)
        .await
        .expect("Crawl should succeed");

    let tree = &outcome.tree;
    assert_eq!(tree.kind.as_str(), "lang_root");
    assert_eq!(tree.title, "TESSA (EN)");
    assert_eq!(tree.description.as_deref(), Some("Teacher Education in Sub-Saharan Africa."));
    assert_eq!(tree.children.len(), 2);

    let literacy = tree
        .children
        .iter()
        .find(|c| c.title == "Literacy")
        .expect("Literacy topic missing");
    assert_eq!(literacy.kind.as_str(), "subpage");
    assert_eq!(literacy.hidden_subspan_text.as_deref(), Some("Module"));
    assert_eq!(literacy.children.len(), 2);

    let worksheet = literacy
        .children
        .iter()
        .find(|c| c.kind.as_str() == "resource")
        .expect("Worksheet missing");
    assert_eq!(worksheet.content_type.as_deref(), Some("application/pdf"));
    assert_eq!(
        worksheet.file_url.as_deref(),
        Some(page_url(&base_url, RESOURCE, "30").as_str())
    );

    assert_eq!(outcome.stats.pages_fetched, 5);
    assert_eq!(outcome.stats.pages_failed, 0);
    assert!(outcome.stats.links_ignored >= 1);
    assert!(outcome.stats.links_duplicate >= 1);
    assert!(!outcome.stats.limit_reached);
}

#[tokio::test]
async fn test_page_limit_yields_partial_tree() {
    let mock_server = MockServer::start().await;
    mount_site(&mock_server).await;

    let tmp = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), tmp.path());
    let fetcher = create_fetcher(&config);

    let outcome = crawl_language(&config, Language::En, fetcher, 2).await.unwrap();

    assert_eq!(outcome.stats.pages_fetched, 2);
    assert!(outcome.stats.limit_reached);
    assert_eq!(outcome.tree.children.len(), 1);
}

#[tokio::test]
async fn test_missing_pages_are_counted_not_fatal() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    // Only the root is served; both topics answer 404
    mount_html(&mock_server, COURSE, "2042", root_page(&base_url)).await;

    let tmp = TempDir::new().unwrap();
    let config = create_test_config(&base_url, tmp.path());
    let fetcher = create_fetcher(&config);

    let outcome = crawl_language(&config, Language::En, fetcher, 100).await.unwrap();

    assert_eq!(outcome.stats.pages_fetched, 3);
    assert_eq!(outcome.stats.pages_failed, 2);
    assert_eq!(outcome.tree.len(), 1);
}

#[tokio::test]
async fn test_crawl_restructure_and_persist() {
    let mock_server = MockServer::start().await;
    mount_site(&mock_server).await;
    let base_url = mock_server.uri();

    let tmp = TempDir::new().unwrap();
    let config = create_test_config(&base_url, tmp.path());
    let trees_dir = tmp.path().join("trees");
    let fetcher = create_fetcher(&config);

    let started_at = chrono::Utc::now();
    let outcome = crawl_language(&config, Language::En, fetcher, 100).await.unwrap();
    write_raw_tree(&trees_dir, Language::En, &outcome.tree).unwrap();

    let mut tree = outcome.tree;
    let raw_nodes = tree.len();
    let restructured = normalize_tree(&mut tree, Language::En);
    let canonical = to_canonical(&tree, UnknownKindPolicy::Exclude).unwrap();
    write_canonical_tree(&trees_dir, Language::En, &canonical).unwrap();

    assert!(trees_dir.join("raw_tree_en.json").exists());
    let loaded = read_canonical_tree(&trees_dir, Language::En).unwrap();
    assert_eq!(loaded, canonical);

    assert_eq!(canonical.kind, CanonicalKind::LanguageTree);
    let kinds: Vec<_> = canonical.iter().map(|n| n.kind).collect();
    assert!(kinds.contains(&CanonicalKind::SubpageTopic));
    assert!(kinds.contains(&CanonicalKind::ContentPage));
    assert!(kinds.contains(&CanonicalKind::ContentModule));
    assert!(kinds.contains(&CanonicalKind::PdfDocument));
    assert!(canonical.iter().all(|n| n.language == Language::En));

    let module = canonical
        .iter()
        .find(|n| n.kind == CanonicalKind::ContentModule)
        .unwrap();
    assert_eq!(module.source_id, "content_module_21");

    let report = LanguageReport::new(
        Language::En,
        started_at,
        "hash",
        raw_nodes,
        &canonical,
        restructured,
        outcome.stats,
    );
    assert_eq!(report.canonical_nodes, 5);
    assert_eq!(report.count("pdf_document"), 1);
    assert!(report.unknown.is_empty());
}
