//! Module/page downloader
//!
//! This module handles:
//! - Walking a module's table of contents (or its next-link chain)
//! - Cleaning every page and localizing its assets
//! - Rendering a local index and zipping the result deterministically
//! - Building the metadata record handed to packaging
//!
//! Media nodes are not downloaded; their metadata carries the file URL.

mod archive;
mod assets;
mod contents;
mod page;

pub use archive::{list_files, write_archive};
pub use assets::{asset_filename, collect_assets, rewrite_references, AssetRef, AssetStore, ASSETS_DIR};
pub use contents::{
    claim_filename, contents_from_chain, next_link, parse_toc, render_index, section_filename, ModuleContents, Section,
    Subsection,
};
pub use page::{extract_page, render_page, ExtractedPage, STRIPPED_WRAPPERS};

use crate::crawler::{FetchResult, Fetcher};
use crate::site::{Language, AUTHOR, LICENSE};
use crate::tree::{CanonicalKind, CanonicalNode};
use crate::{HarvestError, Result};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

/// Upper bound on pages followed along a next-link chain
const MAX_CHAIN_PAGES: usize = 500;

/// Metadata record of one packaged node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageMetadata {
    pub title: String,
    pub description: Option<String>,
    pub author: String,
    pub license: String,
    pub source_id: String,
    pub language: Language,
    pub kind: CanonicalKind,
    /// Remote file of a media node
    pub file_url: Option<String>,
    pub content_type: Option<String>,
}

impl PackageMetadata {
    pub fn for_node(node: &CanonicalNode) -> Self {
        Self {
            title: node.title.clone(),
            description: node.description.clone(),
            author: AUTHOR.to_string(),
            license: LICENSE.to_string(),
            source_id: node.source_id.clone(),
            language: node.language,
            kind: node.kind,
            file_url: node.file_url.clone(),
            content_type: node.content_type.clone(),
        }
    }
}

/// Result of materializing one node
#[derive(Debug, Clone, Serialize)]
pub struct PackagedContent {
    /// Packaged directory; `None` for media nodes
    pub directory: Option<PathBuf>,
    /// Zip of `directory`
    pub archive: Option<PathBuf>,
    pub metadata: PackageMetadata,
}

/// A fetched module page
struct LoadedPage {
    url: Url,
    body: String,
}

/// Materializes canonical nodes below a downloads directory
pub struct Downloader {
    fetcher: Arc<dyn Fetcher>,
    downloads_dir: PathBuf,
}

impl Downloader {
    pub fn new(fetcher: Arc<dyn Fetcher>, downloads_dir: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            downloads_dir: downloads_dir.into(),
        }
    }

    /// Packages one content page or content module, or describes one media node
    ///
    /// The module directory is `{downloads-dir}/{source-id}` and its archive
    /// `{downloads-dir}/{source-id}.zip`; both are rebuilt from scratch.
    ///
    /// # Errors
    ///
    /// Fails when the node is neither content nor media, when the first page
    /// of the module cannot be fetched, or on local I/O errors. Later pages
    /// that fail are logged and left out.
    pub async fn materialize(&self, node: &CanonicalNode) -> Result<PackagedContent> {
        let metadata = PackageMetadata::for_node(node);

        match node.kind {
            CanonicalKind::AudioResource | CanonicalKind::PdfDocument => {
                return Ok(PackagedContent {
                    directory: None,
                    archive: None,
                    metadata,
                })
            }
            kind if kind.is_content() => {}
            kind => {
                return Err(HarvestError::InvariantViolation(format!(
                    "{} node {} cannot be materialized",
                    kind.as_str(),
                    node.source_id
                )))
            }
        }

        let first = self.load(&node.url).await?;
        let first_page = extract_page(&first.body, &first.url);

        let directory = self.downloads_dir.join(&node.source_id);
        if tokio::fs::try_exists(&directory).await? {
            tokio::fs::remove_dir_all(&directory).await?;
        }
        tokio::fs::create_dir_all(&directory).await?;
        let mut store = AssetStore::new(&directory);

        let contents = match first_page.toc.clone() {
            Some(contents) => {
                self.download_listed(&contents, first, first_page, &directory, &mut store)
                    .await?;
                contents
            }
            None => {
                self.download_chain(first, first_page, &directory, &mut store)
                    .await?
            }
        };

        let index = render_index(&node.title, &contents);
        tokio::fs::write(directory.join("index.html"), index).await?;

        let archive = self.downloads_dir.join(format!("{}.zip", node.source_id));
        let entries = write_archive(&directory, &archive)?;
        tracing::info!(
            "Packaged {} ({} pages, {} assets, {} entries)",
            node.source_id,
            contents.pages().len(),
            store.len(),
            entries
        );

        Ok(PackagedContent {
            directory: Some(directory),
            archive: Some(archive),
            metadata,
        })
    }

    /// Materializes every content and media node of a canonical tree
    ///
    /// A node that fails is logged and skipped.
    pub async fn materialize_tree(&self, root: &CanonicalNode) -> Vec<PackagedContent> {
        let mut packaged = Vec::new();
        for node in root.iter() {
            let wanted = node.kind.is_content()
                || matches!(node.kind, CanonicalKind::AudioResource | CanonicalKind::PdfDocument);
            if !wanted {
                continue;
            }
            match self.materialize(node).await {
                Ok(content) => packaged.push(content),
                Err(e) => tracing::error!("Failed to materialize {} ({}): {}", node.source_id, node.url, e),
            }
        }
        packaged
    }

    async fn load(&self, url: &str) -> Result<LoadedPage> {
        match self.fetcher.get(url).await {
            FetchResult::Success { final_url, body, .. } => Ok(LoadedPage {
                url: Url::parse(&final_url).or_else(|_| Url::parse(url))?,
                body,
            }),
            FetchResult::ContentMismatch { content_type, .. } => Err(HarvestError::HtmlStructure {
                url: url.to_string(),
                message: format!("expected a module page, got {}", content_type),
            }),
            FetchResult::HttpError { status_code } => Err(HarvestError::Status {
                url: url.to_string(),
                status: status_code,
            }),
            FetchResult::NetworkError { error } => Err(HarvestError::Fetch {
                url: url.to_string(),
                message: error,
            }),
        }
    }

    async fn save_page(
        &self,
        page: &ExtractedPage,
        title: &str,
        filename: &str,
        directory: &Path,
        store: &mut AssetStore,
    ) -> Result<()> {
        let replacements = store.localize(self.fetcher.as_ref(), &page.assets).await?;
        let html = rewrite_references(&render_page(title, page), &replacements);
        tokio::fs::write(directory.join(filename), html).await?;
        Ok(())
    }

    async fn download_listed(
        &self,
        contents: &ModuleContents,
        first: LoadedPage,
        first_page: ExtractedPage,
        directory: &Path,
        store: &mut AssetStore,
    ) -> Result<()> {
        let mut titles = Vec::new();
        for section in &contents.sections {
            titles.push(section.title.as_str());
            titles.extend(section.subsections.iter().map(|sub| sub.title.as_str()));
        }

        for ((href, filename), title) in contents.pages().into_iter().zip(titles) {
            if href == first.url.as_str() {
                self.save_page(&first_page, title, filename, directory, store).await?;
                continue;
            }
            match self.load(href).await {
                Ok(loaded) => {
                    let page = extract_page(&loaded.body, &loaded.url);
                    self.save_page(&page, title, filename, directory, store).await?;
                }
                Err(e) => tracing::warn!("Skipping module page {}: {}", href, e),
            }
        }
        Ok(())
    }

    async fn download_chain(
        &self,
        first: LoadedPage,
        first_page: ExtractedPage,
        directory: &Path,
        store: &mut AssetStore,
    ) -> Result<ModuleContents> {
        let mut seen = HashSet::new();
        let mut filenames = HashMap::new();
        let mut chain = Vec::new();
        let mut current = Some((first.url, first_page));

        while let Some((url, page)) = current.take() {
            if !seen.insert(url.to_string()) || chain.len() >= MAX_CHAIN_PAGES {
                break;
            }

            let position = (chain.len() + 1).to_string();
            let filename = claim_filename(&mut filenames, &section_filename(url.as_str(), &position));
            let title = page.title.clone().unwrap_or_else(|| format!("Section {}", position));
            self.save_page(&page, &title, &filename, directory, store).await?;
            chain.push((title, url.to_string(), filename));

            if let Some(next) = page.next {
                match self.load(&next).await {
                    Ok(loaded) => {
                        let next_page = extract_page(&loaded.body, &loaded.url);
                        current = Some((loaded.url, next_page));
                    }
                    Err(e) => tracing::warn!("Next-page chain stopped at {}: {}", next, e),
                }
            }
        }

        Ok(contents_from_chain(chain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::testing::StaticFetcher;
    use tempfile::TempDir;

    const MODULE: &str = "http://www.open.edu/openlearncreate/mod/oucontent/view.php?id=7";

    fn node(kind: CanonicalKind, url: &str, source_id: &str) -> CanonicalNode {
        CanonicalNode {
            url: url.to_string(),
            kind,
            title: "Reading for meaning".to_string(),
            language: Language::En,
            source_id: source_id.to_string(),
            hidden_subspan_text: None,
            description: Some("A module".to_string()),
            content_type: None,
            file_url: None,
            raw_kind: None,
            children: Vec::new(),
        }
    }

    fn module_page(body: &str, toc: bool) -> String {
        let toc = if toc {
            r#"<div class="oucontent-toc"><ul>
                <li><a href="view.php?id=7">Introduction</a></li>
                <li><a href="view.php?id=7&section=1">1 Stories</a>
                    <ul><li><a href="view.php?id=7&section=1.1">1.1 Retelling</a></li></ul></li>
            </ul></div>"#
        } else {
            ""
        };
        format!(
            r#"<html><head><title>Module</title></head><body>{}
            <div id="oucontent-content"><p>{}</p><img src="/pix/tree.png"></div>
            <div id="page-footer">Footer</div></body></html>"#,
            toc, body
        )
    }

    #[tokio::test]
    async fn test_materialize_module_with_toc() {
        let tmp = TempDir::new().unwrap();
        let fetcher = StaticFetcher::new()
            .html(MODULE, &module_page("Welcome", true))
            .html(&format!("{}&section=1", MODULE), &module_page("Stories", true))
            .html(&format!("{}&section=1.1", MODULE), &module_page("Retelling", true))
            .file("http://www.open.edu/pix/tree.png", "image/png", b"PNG");
        let fetcher = Arc::new(fetcher);
        let downloader = Downloader::new(fetcher.clone(), tmp.path());

        let packaged = downloader
            .materialize(&node(CanonicalKind::ContentModule, MODULE, "content_module_7"))
            .await
            .unwrap();

        let dir = packaged.directory.unwrap();
        let files: Vec<String> = list_files(&dir).unwrap().into_iter().map(|(name, _)| name).collect();
        assert_eq!(files.len(), 5);
        assert!(files.contains(&"index.html".to_string()));
        assert!(files.contains(&"section-1.1.html".to_string()));

        assert!(files.contains(&"page-1.html".to_string()));
        let section = std::fs::read_to_string(dir.join("section-1.html")).unwrap();
        assert!(section.contains("Stories"));
        assert!(section.contains("src=\"assets/"));
        assert!(!section.contains("Footer"));

        assert!(packaged.archive.unwrap().exists());
        assert_eq!(packaged.metadata.author, "TESSA");
        assert_eq!(packaged.metadata.license, "CC BY-SA");
        assert_eq!(packaged.metadata.source_id, "content_module_7");

        // the tree image is fetched once for all three pages
        let image_requests = fetcher
            .requests()
            .iter()
            .filter(|url| url.ends_with("tree.png"))
            .count();
        assert_eq!(image_requests, 1);
    }

    #[tokio::test]
    async fn test_materialize_follows_next_links() {
        let tmp = TempDir::new().unwrap();
        let second = format!("{}&section=2", MODULE);
        let first_body = module_page("One", false).replace(
            "</body>",
            r#"<a rel="next" href="view.php?id=7&section=2">Next</a></body>"#,
        );
        let second_body = module_page("Two", false).replace(
            "</body>",
            r#"<a rel="next" href="view.php?id=7">Back to start</a></body>"#,
        );
        let fetcher = StaticFetcher::new()
            .html(MODULE, &first_body)
            .html(&second, &second_body);
        let downloader = Downloader::new(Arc::new(fetcher), tmp.path());

        let packaged = downloader
            .materialize(&node(CanonicalKind::ContentPage, MODULE, "content_page_7"))
            .await
            .unwrap();

        let dir = packaged.directory.unwrap();
        assert!(dir.join("page-1.html").exists());
        assert!(dir.join("section-2.html").exists());
        let index = std::fs::read_to_string(dir.join("index.html")).unwrap();
        assert!(index.contains("section-2.html"));
    }

    #[tokio::test]
    async fn test_materialize_is_deterministic() {
        let tmp = TempDir::new().unwrap();
        let fetcher = Arc::new(StaticFetcher::new().html(MODULE, &module_page("Only", false)));
        let downloader = Downloader::new(fetcher, tmp.path());
        let module = node(CanonicalKind::ContentPage, MODULE, "content_page_7");

        let first = downloader.materialize(&module).await.unwrap();
        let first_bytes = std::fs::read(first.archive.unwrap()).unwrap();
        let second = downloader.materialize(&module).await.unwrap();
        let second_bytes = std::fs::read(second.archive.unwrap()).unwrap();

        assert_eq!(first_bytes, second_bytes);
    }

    #[tokio::test]
    async fn test_media_node_metadata_only() {
        let tmp = TempDir::new().unwrap();
        let downloader = Downloader::new(Arc::new(StaticFetcher::new()), tmp.path());
        let mut audio = node(CanonicalKind::AudioResource, "http://www.open.edu/a.mp3", "audio_resource_1");
        audio.file_url = Some("http://www.open.edu/a.mp3".to_string());

        let packaged = downloader.materialize(&audio).await.unwrap();
        assert!(packaged.directory.is_none());
        assert_eq!(packaged.metadata.file_url.as_deref(), Some("http://www.open.edu/a.mp3"));
    }

    #[tokio::test]
    async fn test_subpage_topic_rejected() {
        let tmp = TempDir::new().unwrap();
        let downloader = Downloader::new(Arc::new(StaticFetcher::new()), tmp.path());
        let topic = node(CanonicalKind::SubpageTopic, MODULE, "subpage_topic_7");
        assert!(matches!(
            downloader.materialize(&topic).await,
            Err(HarvestError::InvariantViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_first_page() {
        let tmp = TempDir::new().unwrap();
        let downloader = Downloader::new(Arc::new(StaticFetcher::new()), tmp.path());
        let module = node(CanonicalKind::ContentModule, MODULE, "content_module_7");
        assert!(matches!(
            downloader.materialize(&module).await,
            Err(HarvestError::Status { status: 404, .. })
        ));
        assert!(!tmp.path().join("content_module_7").exists());
    }
}
