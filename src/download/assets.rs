//! Embedded assets of downloaded pages
//!
//! Images, stylesheets and scripts are fetched once per module, stored under
//! `assets/` with content-independent names derived from their URL, and the
//! page references are rewritten to the local copies.

use crate::crawler::{resolve_link, Fetcher};
use crate::Result;
use scraper::{ElementRef, Html, Selector};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Directory below the module directory holding the assets
pub const ASSETS_DIR: &str = "assets";

/// Asset-bearing elements inside the content region
const REGION_ASSETS: &[(&str, &str)] = &[("img[src]", "src"), ("script[src]", "src")];

/// Asset-bearing elements anywhere in the document
const DOCUMENT_ASSETS: &[(&str, &str)] = &[("link[rel=stylesheet][href]", "href")];

/// An asset reference as written in the page, plus its absolute URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef {
    pub raw: String,
    pub url: String,
    pub stylesheet: bool,
}

fn select_refs(scope: &ElementRef, css: &str, attr: &str, base: &url::Url, stylesheet: bool, out: &mut Vec<AssetRef>) {
    let Ok(selector) = Selector::parse(css) else {
        return;
    };
    for element in scope.select(&selector) {
        let Some(raw) = element.value().attr(attr) else {
            continue;
        };
        let Some(url) = resolve_link(raw, base) else {
            continue;
        };
        if out.iter().all(|asset| asset.raw != raw) {
            out.push(AssetRef {
                raw: raw.to_string(),
                url,
                stylesheet,
            });
        }
    }
}

/// Collects the assets referenced by `region` and the document's stylesheets
///
/// References are deduplicated by their raw attribute value, in document order.
pub fn collect_assets(document: &Html, region: &ElementRef, base: &url::Url) -> Vec<AssetRef> {
    let mut assets = Vec::new();
    let root = document.root_element();
    for (css, attr) in DOCUMENT_ASSETS {
        select_refs(&root, css, attr, base, true, &mut assets);
    }
    for (css, attr) in REGION_ASSETS {
        select_refs(region, css, attr, base, false, &mut assets);
    }
    assets
}

/// Local filename of an asset: a SHA-256 prefix of the URL plus its extension
///
/// # Example
///
/// ```
/// use tessa_harvest::download::asset_filename;
///
/// let name = asset_filename("http://www.open.edu/img/logo.PNG?v=2");
/// assert!(name.ends_with(".png"));
/// assert_eq!(name.len(), 16 + 4);
/// ```
pub fn asset_filename(url: &str) -> String {
    let digest = hex::encode(Sha256::digest(url.as_bytes()));
    let ext = url::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            let last = parsed.path_segments()?.last()?.to_string();
            let (_, ext) = last.rsplit_once('.')?;
            Some(ext.to_ascii_lowercase())
        })
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "bin".to_string());

    format!("{}.{}", &digest[..16], ext)
}

/// Escapes an attribute value the way the HTML serializer writes it
pub fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('\u{a0}', "&nbsp;")
        .replace('"', "&quot;")
}

/// Replaces quoted attribute values `raw` with `local`
pub fn rewrite_references(html: &str, replacements: &[(String, String)]) -> String {
    replacements.iter().fold(html.to_string(), |html, (raw, local)| {
        html.replace(&format!("=\"{}\"", escape_attr(raw)), &format!("=\"{}\"", local))
    })
}

/// Fetches and stores the assets of one module
pub struct AssetStore {
    dir: PathBuf,
    /// Absolute URL to local relative path; `None` when the fetch failed
    saved: HashMap<String, Option<String>>,
}

impl AssetStore {
    pub fn new(module_dir: &Path) -> Self {
        Self {
            dir: module_dir.join(ASSETS_DIR),
            saved: HashMap::new(),
        }
    }

    /// Downloads `assets` not stored yet and returns the `(raw, local)` pairs
    /// to rewrite
    ///
    /// A failed fetch is logged and the reference keeps pointing at the
    /// remote URL. Only local write failures are errors.
    pub async fn localize(&mut self, fetcher: &dyn Fetcher, assets: &[AssetRef]) -> Result<Vec<(String, String)>> {
        let mut replacements = Vec::new();

        for asset in assets {
            if !self.saved.contains_key(&asset.url) {
                let local = match fetcher.get_bytes(&asset.url).await {
                    Ok(bytes) => {
                        let filename = asset_filename(&asset.url);
                        tokio::fs::create_dir_all(&self.dir).await?;
                        tokio::fs::write(self.dir.join(&filename), bytes).await?;
                        Some(format!("{}/{}", ASSETS_DIR, filename))
                    }
                    Err(e) => {
                        tracing::warn!("Failed to fetch asset {}: {}", asset.url, e);
                        None
                    }
                };
                self.saved.insert(asset.url.clone(), local);
            }

            if let Some(Some(local)) = self.saved.get(&asset.url) {
                replacements.push((asset.raw.clone(), local.clone()));
            }
        }

        Ok(replacements)
    }

    /// Number of assets stored locally
    pub fn len(&self) -> usize {
        self.saved.values().filter(|local| local.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
