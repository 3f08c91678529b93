//! HTML helpers for extracting links and labels from site pages
//!
//! This module handles:
//! - Locating the content region of a page (with a `body` fallback)
//! - Collecting anchors with absolute URLs and split labels
//! - Separating the accessibility helper span from link labels
//! - Page title and free-text extraction

use ego_tree::NodeId;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Label of a link, with the accessibility hint separated out
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinkLabel {
    /// Visible text, whitespace-normalized
    pub title: String,

    /// Text of the nested `span.accesshide` helper (e.g. "Module"), if any
    pub hidden_subspan_text: Option<String>,
}

/// An anchor found inside a page region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    /// Absolute URL the anchor points at
    pub url: String,
    pub label: LinkLabel,
}

/// Normalizes extracted text: drops carriage returns, turns newlines into
/// spaces, collapses runs of whitespace and trims
///
/// # Example
///
/// ```
/// use tessa_harvest::crawler::normalize_text;
///
/// assert_eq!(normalize_text("  Module 1:\r\n   Reading  "), "Module 1: Reading");
/// ```
pub fn normalize_text(text: &str) -> String {
    text.replace('\r', "")
        .replace('\n', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Collects and normalizes all text below `element`
pub fn element_text(element: &ElementRef) -> String {
    normalize_text(&element.text().collect::<String>())
}

/// Splits an anchor's label into its visible title and its hidden helper text
///
/// The anchor is re-parsed on its own so the `span.accesshide` nodes can be
/// detached without touching the page document.
pub fn split_link_label(anchor: &ElementRef) -> LinkLabel {
    let mut fragment = Html::parse_fragment(&anchor.html());

    let hidden_ids: Vec<NodeId> = match Selector::parse("span.accesshide") {
        Ok(selector) => fragment.select(&selector).map(|span| span.id()).collect(),
        Err(_) => Vec::new(),
    };

    let mut hidden_parts = Vec::new();
    for id in hidden_ids {
        if let Some(span) = fragment.tree.get(id).and_then(ElementRef::wrap) {
            let text = element_text(&span);
            if !text.is_empty() {
                hidden_parts.push(text);
            }
        }
        if let Some(mut node) = fragment.tree.get_mut(id) {
            node.detach();
        }
    }

    let title = element_text(&fragment.root_element());
    let hidden_subspan_text = if hidden_parts.is_empty() {
        None
    } else {
        Some(hidden_parts.join(" "))
    };

    LinkLabel {
        title,
        hidden_subspan_text,
    }
}

/// Returns the first element matching one of `selectors`, in order
pub fn find_region<'a>(document: &'a Html, selectors: &[&str]) -> Option<ElementRef<'a>> {
    selectors.iter().find_map(|css| {
        let selector = Selector::parse(css).ok()?;
        document.select(&selector).next()
    })
}

/// Returns the content region of a page, falling back to `body`
///
/// A missing region is site drift, not an error: it is logged and the whole
/// body is scanned instead.
pub fn region_or_body<'a>(document: &'a Html, selectors: &[&str], page_url: &str) -> ElementRef<'a> {
    if let Some(region) = find_region(document, selectors) {
        return region;
    }
    tracing::warn!(
        "No region matching {:?} on {}, falling back to body",
        selectors,
        page_url
    );
    find_region(document, &["body"]).unwrap_or_else(|| document.root_element())
}

/// Collects the anchors below `region`, resolved against `base_url`
///
/// Anchors without a usable href are skipped.
pub fn region_anchors(region: &ElementRef, base_url: &Url) -> Vec<Anchor> {
    let Ok(selector) = Selector::parse("a") else {
        return Vec::new();
    };

    region
        .select(&selector)
        .filter_map(|anchor| anchor_from(&anchor, base_url))
        .collect()
}

/// Builds an `Anchor` from an `a` element, if its href resolves
pub fn anchor_from(anchor: &ElementRef, base_url: &Url) -> Option<Anchor> {
    let Some(href) = anchor.value().attr("href") else {
        tracing::debug!("Anchor without href on {}", base_url);
        return None;
    };
    let url = resolve_link(href, base_url)?;
    Some(Anchor {
        url,
        label: split_link_label(anchor),
    })
}

/// Returns true if `element` or one of its ancestors carries `class`
pub fn within_class(element: &ElementRef, class: &str) -> bool {
    std::iter::once(*element)
        .chain(element.ancestors().filter_map(ElementRef::wrap))
        .any(|el| el.value().classes().any(|c| c == class))
}

/// Returns true if `element` contains a link to exactly `url`
pub fn links_to(element: &ElementRef, url: &str) -> bool {
    let Ok(selector) = Selector::parse("a[href]") else {
        return false;
    };
    element
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .any(|href| href.trim() == url)
}

/// Extracts the page title from the HTML document
pub fn page_title(document: &Html) -> Option<String> {
    let element = find_region(document, &["title"])?;
    Some(element_text(&element)).filter(|s| !s.is_empty())
}

/// Returns the normalized text of the first element matching `css` below `region`
pub fn first_text(region: &ElementRef, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    region
        .select(&selector)
        .next()
        .map(|element| element_text(&element))
        .filter(|s| !s.is_empty())
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
pub fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    // Skip empty hrefs
    if href.is_empty() {
        return None;
    }

    // Skip special schemes
    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    // Skip fragment-only links (same page anchors)
    if href.starts_with('#') {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) => {
            if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
                Some(absolute_url.to_string())
            } else {
                None
            }
        }
        Err(_) => None,
    }
}
