//! Table of contents of a content module
//!
//! A module is paginated into Sections and Subsections. The contents are
//! read from the sidebar table when the page has one, or rebuilt from the
//! chain of "next page" links otherwise.

use crate::crawler::normalize_text;
use crate::crawler::split_link_label;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::fmt::Write as _;
use url::Url;

const TOC_SELECTOR: &str = ".oucontent-toc";
const NEXT_SELECTORS: &[&str] = &["a[rel=next]", ".oucontent-nextpage a"];

/// A Subsection page of a module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subsection {
    pub title: String,
    pub href: String,
    pub filename: String,
}

/// A Section page of a module and the Subsections below it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub href: String,
    pub filename: String,
    pub subsections: Vec<Subsection>,
}

/// Ordered Sections of one module
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleContents {
    pub sections: Vec<Section>,
}

impl ModuleContents {
    /// Every page in reading order as `(href, filename)`
    pub fn pages(&self) -> Vec<(&str, &str)> {
        let mut pages = Vec::new();
        for section in &self.sections {
            pages.push((section.href.as_str(), section.filename.as_str()));
            for sub in &section.subsections {
                pages.push((sub.href.as_str(), sub.filename.as_str()));
            }
        }
        pages
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Makes filenames unique in reading order
    fn dedupe_filenames(&mut self) {
        let mut seen = HashMap::new();
        for section in &mut self.sections {
            section.filename = claim_filename(&mut seen, &section.filename);
            for sub in &mut section.subsections {
                sub.filename = claim_filename(&mut seen, &sub.filename);
            }
        }
    }
}

/// Returns `filename`, or `filename` with a `_n` suffix if it was claimed before
pub fn claim_filename(seen: &mut HashMap<String, usize>, filename: &str) -> String {
    let count = seen.entry(filename.to_string()).or_insert(0);
    *count += 1;
    if *count == 1 {
        return filename.to_string();
    }
    let stem = filename.trim_end_matches(".html");
    format!("{}_{}.html", stem, count)
}

/// Filename of a module page
///
/// Uses the `section` query parameter when the link carries one. Pages
/// without one (the module's opening page) are named by their position under
/// a separate `page-` prefix, so they never take a section number's name.
///
/// # Example
///
/// ```
/// use tessa_harvest::download::section_filename;
///
/// assert_eq!(section_filename("http://x/view.php?id=1&section=2.3", "4"), "section-2.3.html");
/// assert_eq!(section_filename("http://x/view.php?id=1", "4"), "page-4.html");
/// ```
pub fn section_filename(href: &str, position: &str) -> String {
    let section = Url::parse(href).ok().and_then(|url| {
        url.query_pairs()
            .find(|(key, _)| key == "section")
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty() && value.chars().all(|c| c.is_ascii_digit() || c == '.'))
    });

    match section {
        Some(section) => format!("section-{}.html", section),
        None => format!("page-{}.html", position),
    }
}

fn child_elements<'a>(element: &ElementRef<'a>, name: &str) -> Vec<ElementRef<'a>> {
    element
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == name)
        .collect()
}

/// Link and title of the first anchor below `item`, resolved against `base`
fn item_link(item: &ElementRef, base: &Url) -> Option<(String, String)> {
    let selector = Selector::parse("a[href]").ok()?;
    let anchor = item.select(&selector).next()?;
    let href = base.join(anchor.value().attr("href")?).ok()?;
    Some((split_link_label(&anchor).title, href.to_string()))
}

/// Reads the sidebar table of contents, if the page has one
///
/// Top-level list items are Sections; items of a nested list are their
/// Subsections.
pub fn parse_toc(document: &Html, base: &Url) -> Option<ModuleContents> {
    let toc_selector = Selector::parse(TOC_SELECTOR).ok()?;
    let list_selector = Selector::parse("ul, ol").ok()?;

    let toc = document.select(&toc_selector).next()?;
    let list = toc.select(&list_selector).next()?;

    let mut contents = ModuleContents::default();
    for (index, item) in child_elements(&list, "li").into_iter().enumerate() {
        let Some((title, href)) = item_link(&item, base) else {
            continue;
        };
        let position = (index + 1).to_string();

        let mut subsections = Vec::new();
        if let Some(nested) = item.select(&list_selector).next() {
            for (sub_index, sub_item) in child_elements(&nested, "li").into_iter().enumerate() {
                if let Some((title, href)) = item_link(&sub_item, base) {
                    let filename = section_filename(&href, &format!("{}.{}", position, sub_index + 1));
                    subsections.push(Subsection { title, href, filename });
                }
            }
        }

        let filename = section_filename(&href, &position);
        contents.sections.push(Section {
            title,
            href,
            filename,
            subsections,
        });
    }

    if contents.is_empty() {
        return None;
    }
    contents.dedupe_filenames();
    Some(contents)
}

/// The "next page" link of a module page, if any
pub fn next_link(document: &Html, base: &Url) -> Option<String> {
    NEXT_SELECTORS.iter().find_map(|css| {
        let selector = Selector::parse(css).ok()?;
        let href = document.select(&selector).next()?.value().attr("href")?;
        base.join(href).ok().map(|url| url.to_string())
    })
}

/// Rebuilds the contents from pages visited along the next-link chain
///
/// Pages are `(title, href, filename)` in chain order. A filename with a
/// dotted section number is a Subsection of the Section before it.
pub fn contents_from_chain(pages: Vec<(String, String, String)>) -> ModuleContents {
    let mut contents = ModuleContents::default();

    for (title, href, filename) in pages {
        let number = filename
            .strip_prefix("section-")
            .and_then(|rest| rest.strip_suffix(".html"))
            .unwrap_or_default();

        if number.contains('.') {
            if let Some(section) = contents.sections.last_mut() {
                section.subsections.push(Subsection { title, href, filename });
                continue;
            }
        }
        contents.sections.push(Section {
            title,
            href,
            filename,
            subsections: Vec::new(),
        });
    }

    contents.dedupe_filenames();
    contents
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Renders the local `index.html` for a module
pub fn render_index(title: &str, contents: &ModuleContents) -> String {
    let title = escape_html(&normalize_text(title));
    let mut html = String::new();
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n<h1>{}</h1>\n<ul>\n",
        title, title
    );

    for section in &contents.sections {
        let _ = write!(
            html,
            "<li><a href=\"{}\">{}</a>",
            section.filename,
            escape_html(&section.title)
        );
        if !section.subsections.is_empty() {
            html.push_str("\n<ul>\n");
            for sub in &section.subsections {
                let _ = writeln!(html, "<li><a href=\"{}\">{}</a></li>", sub.filename, escape_html(&sub.title));
            }
            html.push_str("</ul>\n");
        }
        html.push_str("</li>\n");
    }

    html.push_str("</ul>\n</body>\n</html>\n");
    html
}
