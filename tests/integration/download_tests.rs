//! Integration tests for the download stage
//!
//! The canonical tree comes from a real crawl of the mock site; every content
//! node is then packaged against the same server.

use crate::support::*;
use std::path::Path;
use tessa_harvest::config::{Config, UnknownKindPolicy};
use tessa_harvest::crawler::crawl_language;
use tessa_harvest::download::{list_files, Downloader, ASSETS_DIR};
use tessa_harvest::output::{manifest_path, write_manifest};
use tessa_harvest::tree::{normalize_tree, to_canonical};
use tessa_harvest::{CanonicalKind, CanonicalNode, Language};
use tempfile::TempDir;
use wiremock::matchers::path;
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_assets(server: &MockServer) {
    Mock::given(path("/theme/styles.css"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("body { margin: 0 }", "text/css"))
        .mount(server)
        .await;
    Mock::given(path("/pix/reading.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0x89, b'P', b'N', b'G'], "image/png"))
        .expect(1..)
        .mount(server)
        .await;
}

async fn crawl_canonical(config: &Config) -> CanonicalNode {
    let fetcher = create_fetcher(config);
    let outcome = crawl_language(config, Language::En, fetcher, 100).await.unwrap();
    let mut tree = outcome.tree;
    normalize_tree(&mut tree, Language::En);
    to_canonical(&tree, UnknownKindPolicy::Exclude).unwrap()
}

fn file_names(dir: &Path) -> Vec<String> {
    list_files(dir).unwrap().into_iter().map(|(name, _)| name).collect()
}

#[tokio::test]
async fn test_materialize_tree_packages_content_nodes() {
    let mock_server = MockServer::start().await;
    mount_site(&mock_server).await;
    mount_assets(&mock_server).await;

    let tmp = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), tmp.path());
    let canonical = crawl_canonical(&config).await;

    let downloads_dir = tmp.path().join("downloads");
    let downloader = Downloader::new(create_fetcher(&config), &downloads_dir);
    let packaged = downloader.materialize_tree(&canonical).await;

    // Content page, content module and the PDF
    assert_eq!(packaged.len(), 3);

    let module = packaged
        .iter()
        .find(|p| p.metadata.kind == CanonicalKind::ContentModule)
        .expect("Module not packaged");
    let module_dir = module.directory.as_ref().unwrap();
    assert_eq!(module_dir, &downloads_dir.join("content_module_21"));
    assert!(module.archive.as_ref().unwrap().exists());

    let names = file_names(module_dir);
    assert!(names.contains(&"index.html".to_string()));
    assert_eq!(names.iter().filter(|n| n.starts_with(ASSETS_DIR)).count(), 2);
    assert_eq!(names.iter().filter(|n| n.ends_with(".html")).count(), 3);

    let index = std::fs::read_to_string(module_dir.join("index.html")).unwrap();
    assert!(index.contains("Introduction"));
    assert!(index.contains("1 Reading aloud"));

    let pdf = packaged
        .iter()
        .find(|p| p.metadata.kind == CanonicalKind::PdfDocument)
        .expect("PDF metadata missing");
    assert!(pdf.directory.is_none());
    assert!(pdf.metadata.file_url.as_deref().unwrap().ends_with("resource/view.php?id=30"));
    assert_eq!(pdf.metadata.content_type.as_deref(), Some("application/pdf"));
}

#[tokio::test]
async fn test_packaged_pages_are_cleaned_and_localized() {
    let mock_server = MockServer::start().await;
    mount_site(&mock_server).await;
    mount_assets(&mock_server).await;

    let tmp = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), tmp.path());
    let canonical = crawl_canonical(&config).await;
    let page = canonical
        .iter()
        .find(|n| n.kind == CanonicalKind::ContentPage)
        .unwrap();

    let downloader = Downloader::new(create_fetcher(&config), tmp.path().join("downloads"));
    let packaged = downloader.materialize(page).await.unwrap();
    let dir = packaged.directory.unwrap();

    let html_name = file_names(&dir)
        .into_iter()
        .find(|n| n.ends_with(".html") && n != "index.html")
        .unwrap();
    let html = std::fs::read_to_string(dir.join(html_name)).unwrap();

    assert!(html.contains("Key resources text"));
    assert!(!html.contains("Home / Literacy"));
    assert!(!html.contains("Footer"));
    assert!(!html.contains("/pix/reading.png"));
    assert!(html.contains(&format!("{}/", ASSETS_DIR)));
}

#[tokio::test]
async fn test_archives_are_reproducible() {
    let mock_server = MockServer::start().await;
    mount_site(&mock_server).await;
    mount_assets(&mock_server).await;

    let tmp = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), tmp.path());
    let canonical = crawl_canonical(&config).await;
    let module = canonical
        .iter()
        .find(|n| n.kind == CanonicalKind::ContentModule)
        .unwrap();

    let downloader = Downloader::new(create_fetcher(&config), tmp.path().join("downloads"));
    let first = downloader.materialize(module).await.unwrap();
    let first_bytes = std::fs::read(first.archive.as_ref().unwrap()).unwrap();

    let second = downloader.materialize(module).await.unwrap();
    let second_bytes = std::fs::read(second.archive.as_ref().unwrap()).unwrap();

    assert_eq!(first_bytes, second_bytes);
}

#[tokio::test]
async fn test_manifest_lists_packaged_content() {
    let mock_server = MockServer::start().await;
    mount_site(&mock_server).await;

    let tmp = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), tmp.path());
    let canonical = crawl_canonical(&config).await;

    let downloads_dir = tmp.path().join("downloads");
    let downloader = Downloader::new(create_fetcher(&config), &downloads_dir);
    let packaged = downloader.materialize_tree(&canonical).await;
    write_manifest(&downloads_dir, Language::En, &packaged).unwrap();

    let text = std::fs::read_to_string(manifest_path(&downloads_dir, Language::En)).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    let entries = json.as_array().unwrap();
    assert_eq!(entries.len(), packaged.len());
    assert!(text.contains("content_page_20"));
    assert!(text.contains("pdf_document_30"));
}

#[tokio::test]
async fn test_unreachable_module_is_skipped() {
    let mock_server = MockServer::start().await;
    mount_site(&mock_server).await;

    let tmp = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), tmp.path());
    let canonical = crawl_canonical(&config).await;

    // Packaging against an empty server: every module page now answers 404
    let empty_server = MockServer::start().await;
    let mut moved = canonical.clone();
    for child in moved.children.iter_mut() {
        child.url = child.url.replace(&mock_server.uri(), &empty_server.uri());
        for grandchild in child.children.iter_mut() {
            grandchild.url = grandchild.url.replace(&mock_server.uri(), &empty_server.uri());
        }
    }

    let downloads_dir = tmp.path().join("downloads");
    let downloader = Downloader::new(create_fetcher(&config), &downloads_dir);
    let packaged = downloader.materialize_tree(&moved).await;

    assert!(packaged.iter().all(|p| p.directory.is_none()));
    assert!(!downloads_dir.join("content_module_21").exists());
}
