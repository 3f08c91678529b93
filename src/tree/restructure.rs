//! Post-crawl passes that turn the raw crawl tree into a clean hierarchy
//!
//! Passes run in this order, once per language:
//!
//! 1. [`restructure`] rewrites raw kinds to canonical kinds using tree depth
//!    and sniffed content types, stamps the language and assigns source ids.
//! 2. [`remove_backlinks`] drops children that point back at an ancestor.
//! 3. [`remove_sections`] drops "Section N" pseudo-pages.
//!
//! All passes walk the tree with explicit stacks.

use crate::site::Language;
use crate::tree::{CanonicalKind, CrawlNode, NodeKind, PageKind};
use serde::Serialize;
use sha2::{Digest, Sha256};
use url::Url;

/// A node the reclassification pass could not place
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnknownNode {
    pub url: String,
    pub kind: String,
    pub title: String,
}

/// Outcome of the restructuring passes
#[derive(Debug, Clone, Default)]
pub struct RestructureReport {
    /// Nodes whose kind changed
    pub reclassified: usize,

    /// Nodes left unclassified for manual review
    pub unknown: Vec<UnknownNode>,

    pub backlinks_removed: usize,
    pub sections_removed: usize,
}

/// Reclassifies raw kinds, stamps `language` and assigns `source_id` on every node
///
/// Depth is measured from the root (depth 0); category and subject nodes do
/// not add a level. An `oucontent` node directly under the language root
/// becomes a content page; deeper ones are modules of a subpage's curriculum.
/// Running the pass again is a no-op apart from re-deriving the same source ids.
pub fn restructure(root: &mut CrawlNode, language: Language) -> RestructureReport {
    let mut report = RestructureReport::default();
    let mut stack: Vec<(&mut CrawlNode, usize)> = vec![(root, 0)];

    while let Some((node, depth)) = stack.pop() {
        let child_depth = match node.kind {
            NodeKind::Raw(kind) if kind.is_grouping() => depth,
            _ => depth + 1,
        };

        match reclassify(&node.kind, depth, node.content_type.as_deref()) {
            Some(kind) => {
                if node.kind != NodeKind::Canonical(kind) {
                    report.reclassified += 1;
                }
                node.kind = NodeKind::Canonical(kind);
            }
            None => {
                tracing::warn!(
                    "Unknown node kind '{}' at {} ({}), leaving unclassified",
                    node.kind,
                    node.url,
                    node.title
                );
                report.unknown.push(UnknownNode {
                    url: node.url.clone(),
                    kind: node.kind.to_string(),
                    title: node.title.clone(),
                });
            }
        }

        node.language = Some(language);
        node.source_id = Some(derive_source_id(node.kind.as_str(), &node.url));

        if node.title.trim().is_empty() {
            tracing::warn!("Node {} ({}) has no title, keeping it", node.url, node.kind);
        }

        for child in node.children.iter_mut() {
            stack.push((child, child_depth));
        }
    }

    report
}

/// Maps a kind at a given depth to its canonical kind, or None when unrecognized
fn reclassify(kind: &NodeKind, depth: usize, content_type: Option<&str>) -> Option<CanonicalKind> {
    match kind {
        NodeKind::Raw(PageKind::LanguageRoot) => Some(CanonicalKind::LanguageTree),
        NodeKind::Raw(
            PageKind::Subpage
            | PageKind::AudioResourcesSubpage
            | PageKind::AudioTopicSubpage
            | PageKind::Category
            | PageKind::Subject,
        ) => Some(CanonicalKind::SubpageTopic),
        NodeKind::Raw(PageKind::Oucontent) => {
            if depth > 1 {
                Some(CanonicalKind::ContentModule)
            } else {
                Some(CanonicalKind::ContentPage)
            }
        }
        NodeKind::Raw(PageKind::Resource | PageKind::MediaFile) => {
            Some(classify_media(content_type))
        }
        // Already canonical (pass re-run on a restructured tree)
        NodeKind::Canonical(CanonicalKind::Unclassified) => None,
        NodeKind::Canonical(kind) => Some(*kind),
        NodeKind::Unknown(_) => None,
    }
}

/// Picks the canonical media kind for a sniffed content type
pub fn classify_media(content_type: Option<&str>) -> CanonicalKind {
    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_lowercase())
        .unwrap_or_default();

    if mime.starts_with("audio/") {
        CanonicalKind::AudioResource
    } else if mime == "application/pdf" {
        CanonicalKind::PdfDocument
    } else {
        CanonicalKind::UnsupportedFormat
    }
}

/// Derives a stable source id from a kind tag and the page id in the URL
///
/// Nodes that share a page (section groups) carry a fragment and get it appended.
/// URLs without an `id` parameter fall back to a short hash of the URL.
pub fn derive_source_id(kind: &str, url: &str) -> String {
    let parsed = Url::parse(url).ok();
    let id = parsed.as_ref().and_then(crate::url::page_id);
    let fragment = parsed
        .as_ref()
        .and_then(|u| u.fragment())
        .filter(|f| !f.is_empty());

    match (id, fragment) {
        (Some(id), Some(fragment)) => format!("{}_{}_{}", kind, id, fragment),
        (Some(id), None) => format!("{}_{}", kind, id),
        (None, _) => {
            let digest = Sha256::digest(url.as_bytes());
            format!("{}_{}", kind, &hex::encode(digest)[..16])
        }
    }
}

/// Drops children whose URL equals the URL of the node or any of its ancestors
///
/// Such links are "back to course" style navigation captured as content;
/// descending into them would repeat subtrees. Returns the number of dropped nodes.
pub fn remove_backlinks(root: &mut CrawlNode) -> usize {
    let mut removed = 0;
    let root_path = vec![root.url.clone()];
    let mut stack: Vec<(&mut CrawlNode, Vec<String>)> = vec![(root, root_path)];

    while let Some((node, breadcrumb)) = stack.pop() {
        let before = node.children.len();
        node.children.retain(|child| {
            let is_backlink = breadcrumb.contains(&child.url);
            if is_backlink {
                tracing::debug!("Dropping back-link {} under {}", child.url, node_label(&breadcrumb));
            }
            !is_backlink
        });
        removed += before - node.children.len();

        for child in node.children.iter_mut() {
            let mut path = breadcrumb.clone();
            path.push(child.url.clone());
            stack.push((child, path));
        }
    }

    removed
}

fn node_label(breadcrumb: &[String]) -> &str {
    breadcrumb.last().map(String::as_str).unwrap_or("")
}

/// Drops children whose title starts with the language's "Section" keyword
///
/// Applied after back-link removal. Nodes with an empty title are kept. Running
/// it again on its own output removes nothing. Returns the number of dropped nodes.
pub fn remove_sections(root: &mut CrawlNode, language: Language) -> usize {
    let mut removed = 0;
    let mut stack: Vec<&mut CrawlNode> = vec![root];

    while let Some(node) = stack.pop() {
        let before = node.children.len();
        node.children.retain(|child| {
            let is_section = !child.title.is_empty() && language.is_section_title(&child.title);
            if is_section {
                tracing::debug!("Dropping section page '{}' ({})", child.title, child.url);
            }
            !is_section
        });
        removed += before - node.children.len();

        stack.extend(node.children.iter_mut());
    }

    removed
}

/// Runs all three passes in order and returns the reclassification report
pub fn normalize_tree(root: &mut CrawlNode, language: Language) -> RestructureReport {
    let mut report = restructure(root, language);
    report.backlinks_removed = remove_backlinks(root);
    report.sections_removed = remove_sections(root, language);
    tracing::info!(
        "Restructured {} tree: {} reclassified, {} unknown, {} back-links and {} sections removed",
        language,
        report.reclassified,
        report.unknown.len(),
        report.backlinks_removed,
        report.sections_removed
    );
    report
}
