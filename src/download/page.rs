//! Cleaning and rendering of a single module page

use crate::crawler::{find_region, page_title};
use crate::download::assets::{collect_assets, escape_attr, AssetRef};
use crate::download::contents::{next_link, parse_toc, ModuleContents};
use scraper::{Html, Selector};
use url::Url;

/// Cosmetic wrappers removed from every downloaded page
pub const STRIPPED_WRAPPERS: &[&str] = &[
    "#page-navbar",
    ".breadcrumb",
    ".oucontent-printable",
    ".oucontent-copyright",
    "#page-footer",
    "script:not([src])",
];

const CONTENT_REGIONS: &[&str] = &["#oucontent-content", ".oucontent-content"];

/// What a module page yields once cleaned
#[derive(Debug, Clone)]
pub struct ExtractedPage {
    pub title: Option<String>,
    /// Serialized content region
    pub content: String,
    pub assets: Vec<AssetRef>,
    pub next: Option<String>,
    pub toc: Option<ModuleContents>,
}

/// Parses a module page, strips its wrappers and keeps the content region
///
/// Navigation data (contents table, next link) is read before anything is
/// removed. A page without a content region keeps its whole body.
pub fn extract_page(html: &str, page_url: &Url) -> ExtractedPage {
    let mut document = Html::parse_document(html);

    let title = page_title(&document);
    let toc = parse_toc(&document, page_url);
    let next = next_link(&document, page_url);

    let stripped: Vec<_> = STRIPPED_WRAPPERS
        .iter()
        .filter_map(|css| Selector::parse(css).ok())
        .flat_map(|selector| document.select(&selector).map(|el| el.id()).collect::<Vec<_>>())
        .collect();
    for id in stripped {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }

    let region = match find_region(&document, CONTENT_REGIONS) {
        Some(region) => region,
        None => {
            tracing::warn!("No module content region on {}, keeping the body", page_url);
            find_region(&document, &["body"]).unwrap_or_else(|| document.root_element())
        }
    };

    let assets = collect_assets(&document, &region, page_url);
    let content = region.html();

    ExtractedPage {
        title,
        content,
        assets,
        next,
        toc,
    }
}

/// Renders a cleaned page as a standalone document
pub fn render_page(title: &str, page: &ExtractedPage) -> String {
    let stylesheets: String = page
        .assets
        .iter()
        .filter(|asset| asset.stylesheet)
        .map(|asset| format!("<link rel=\"stylesheet\" href=\"{}\">\n", escape_attr(&asset.raw)))
        .collect();

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n{}</head>\n<body>\n{}\n</body>\n</html>\n",
        title.replace('&', "&amp;").replace('<', "&lt;"),
        stylesheets,
        page.content
    )
}
