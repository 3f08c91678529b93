//! Page handlers
//!
//! Each fetched page is dispatched on the kind it was enqueued with. The
//! handler table below decides which DOM region is scanned, which link kinds
//! are followed, and how the node description is found, so per-language and
//! per-kind variance stays in data rather than in branching code.
//!
//! Handlers parse the page synchronously into plain scan results before any
//! probe is awaited.

use crate::crawler::fetcher::{Fetcher, ProbeResult};
use crate::crawler::frontier::{CrawlContext, Frontier, FrontierEntry};
use crate::crawler::parser::{
    anchor_from, element_text, first_text, links_to, normalize_text, page_title, region_anchors,
    region_or_body, resolve_link, within_class, Anchor, LinkLabel,
};
use crate::site::{Language, LanguageProfile, TESSA_HOME_URL};
use crate::tree::{CrawlArena, CrawlNode, NodeId, PageKind};
use crate::url::UrlClass;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use url::Url;

/// Subpage descriptions shorter than this are navigation blurbs, not summaries
const MIN_DESCRIPTION_CHARS: usize = 100;

const LABEL_CLASS: &str = "modtype_label";
const HEADING_CLASS: &str = "modtype_heading";

/// Elements of a label activity that may carry a category title, by priority
const LABEL_HEADINGS: &[&str] = &["strong", "b", "h4"];

const ROOT_FOLLOWS: &[PageKind] = &[
    PageKind::Subpage,
    PageKind::AudioResourcesSubpage,
    PageKind::AudioTopicSubpage,
    PageKind::Oucontent,
];

const SUBPAGE_FOLLOWS: &[PageKind] = &[
    PageKind::Subpage,
    PageKind::AudioResourcesSubpage,
    PageKind::AudioTopicSubpage,
    PageKind::Oucontent,
    PageKind::Resource,
];

/// Elements on a resource page that may carry the file itself
const EMBED_SOURCES: &[(&str, &str)] = &[
    ("object[data]", "data"),
    ("embed[src]", "src"),
    ("iframe[src]", "src"),
    ("audio[src]", "src"),
    ("audio source[src]", "src"),
    ("video source[src]", "src"),
];

/// Which profile regions a handler scans
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    CourseContent,
    PageContent,
    ResourceContent,
}

impl Region {
    fn selectors(&self, profile: &LanguageProfile) -> &'static [&'static str] {
        match self {
            Self::CourseContent => profile.root_regions,
            Self::PageContent => profile.subpage_regions,
            Self::ResourceContent => profile.resource_regions,
        }
    }
}

/// Where a listing page keeps its description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptionRule {
    /// First label activity of the course page
    FirstLabel,
    /// First activity text, if long enough to be a summary
    LongActivity,
}

/// Which headings of a listing page open group nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    /// Every link hangs off the page node
    Flat,
    /// Label headings on the language page open categories
    Categories,
    /// Course sections (or label activities) on a subpage open subjects; a
    /// subject follows only its first content module
    Subjects,
}

impl Grouping {
    /// Kind of the nodes opened by a heading
    pub fn kind(&self) -> Option<PageKind> {
        match self {
            Self::Flat => None,
            Self::Categories => Some(PageKind::Category),
            Self::Subjects => Some(PageKind::Subject),
        }
    }
}

/// How a page of a given kind is processed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    /// Scan a region and enqueue every link of a followed kind
    Listing {
        region: Region,
        follows: &'static [PageKind],
        skip_sections: bool,
        description: DescriptionRule,
        grouping: Grouping,
    },
    /// Record the node only
    Terminal,
    /// Resolve the file behind a resource, at most one hop away
    Resource,
    /// Probe the links of every `li.section`; `grouped` adds a node per section
    AudioSections { grouped: bool },
}

/// The handler table
pub fn handler_for(kind: PageKind) -> Handler {
    match kind {
        PageKind::LanguageRoot => Handler::Listing {
            region: Region::CourseContent,
            follows: ROOT_FOLLOWS,
            skip_sections: false,
            description: DescriptionRule::FirstLabel,
            grouping: Grouping::Categories,
        },
        PageKind::Subpage => Handler::Listing {
            region: Region::PageContent,
            follows: SUBPAGE_FOLLOWS,
            skip_sections: true,
            description: DescriptionRule::LongActivity,
            grouping: Grouping::Subjects,
        },
        // Group nodes are built from headings and never queued
        PageKind::Oucontent | PageKind::MediaFile | PageKind::Category | PageKind::Subject => {
            Handler::Terminal
        }
        PageKind::Resource => Handler::Resource,
        PageKind::AudioResourcesSubpage => Handler::AudioSections { grouped: false },
        PageKind::AudioTopicSubpage => Handler::AudioSections { grouped: true },
    }
}

/// A fetched page handed to a handler
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Canonical URL the page was requested under
    pub url: Url,
    /// URL after redirects
    pub final_url: String,
    pub content_type: String,
    /// HTML body; `None` when the response was not HTML
    pub body: Option<String>,
}

impl FetchedPage {
    fn base_url(&self) -> Url {
        Url::parse(&self.final_url).unwrap_or_else(|_| self.url.clone())
    }
}

/// A piece of a listing page, in document order
#[derive(Debug, Clone, PartialEq, Eq)]
enum ListingItem {
    /// Heading that opens a new group
    Heading {
        title: String,
        description: Option<String>,
    },
    /// Label without a heading; continues the current group's description
    Note(String),
    Link(Anchor),
}

struct ListingScan {
    title: Option<String>,
    description: Option<String>,
    items: Vec<ListingItem>,
}

/// The group node links are currently attached to
struct OpenGroup {
    node: NodeId,
    module_taken: bool,
}

struct AudioSection {
    number: usize,
    title: String,
    anchors: Vec<Anchor>,
}

/// Mutable state of one crawl run shared by the handlers
pub(crate) struct CrawlSession {
    pub(crate) fetcher: Arc<dyn Fetcher>,
    pub(crate) frontier: Frontier,
    pub(crate) arena: CrawlArena,
    pub(crate) language: Language,
}

impl CrawlSession {
    /// Confirms the node reserved for `entry` (or takes the root) and runs its handler
    pub(crate) async fn dispatch(&mut self, entry: FrontierEntry, page: FetchedPage) {
        let node = match entry.context.node {
            None => self.arena.root(),
            Some(id) => {
                self.arena.confirm(id);
                id
            }
        };
        let kind = entry.context.kind;
        tracing::info!("Processing {} {} ({})", kind.as_str(), page.url, entry.context.title);

        match handler_for(kind) {
            Handler::Listing {
                region,
                follows,
                skip_sections,
                description,
                grouping,
            } => {
                let rules = ListingRules {
                    region,
                    follows,
                    skip_sections,
                    description,
                    grouping,
                };
                self.handle_listing(node, &page, rules)
            }
            Handler::Terminal => self.fill_missing_title(node, &page),
            Handler::Resource => self.handle_resource(node, &page).await,
            Handler::AudioSections { grouped } => self.handle_audio_sections(node, &page, grouped).await,
        }
    }

    /// Reserves the node of a followed link at its place among its siblings
    /// and queues the page
    ///
    /// Returns false if the frontier rejected the URL; nothing is reserved then.
    fn enqueue_child(&mut self, parent: NodeId, url: Url, kind: PageKind, label: LinkLabel) -> bool {
        if !self.frontier.admit(&url) {
            return false;
        }

        let mut child = CrawlNode::new(url.as_str(), kind, label.title.clone());
        child.hidden_subspan_text = label.hidden_subspan_text;
        child.language = Some(self.language);
        let id = self.arena.reserve_child(parent, child);

        let context = CrawlContext {
            node: Some(id),
            title: label.title,
            kind,
        };
        self.frontier.push(url, context);
        true
    }

    /// Appends a node built from a heading on `page`
    fn open_group(
        &mut self,
        parent: NodeId,
        page: &FetchedPage,
        kind: PageKind,
        number: usize,
        title: String,
    ) -> NodeId {
        let url = format!("{}#{}-{}", page.url, kind.as_str(), number);
        let mut group = CrawlNode::new(url, kind, title);
        group.language = Some(self.language);
        self.arena.append_child(parent, group)
    }

    fn set_title_if_empty(&mut self, node: NodeId, title: Option<String>) {
        let current = self.arena.get_mut(node);
        if !current.title.is_empty() {
            return;
        }
        match title {
            Some(title) => current.title = title,
            None => tracing::warn!("No title for {}", current.url),
        }
    }

    fn fill_missing_title(&mut self, node: NodeId, page: &FetchedPage) {
        if !self.arena.get(node).title.is_empty() {
            return;
        }
        let title = page
            .body
            .as_deref()
            .and_then(|body| page_title(&Html::parse_document(body)));
        self.set_title_if_empty(node, title);
    }

    fn handle_listing(&mut self, node: NodeId, page: &FetchedPage, rules: ListingRules) {
        let Some(body) = page.body.as_deref() else {
            return;
        };
        let selectors = rules.region.selectors(self.language.profile());
        let scan = scan_listing(body, page, selectors, rules.description, rules.grouping);

        self.set_title_if_empty(node, scan.title);
        if let Some(text) = scan.description {
            self.arena.get_mut(node).description = Some(text);
        }

        let mut group: Option<OpenGroup> = None;
        let mut headings = 0;

        for item in scan.items {
            let anchor = match item {
                ListingItem::Heading { title, description } => {
                    let Some(kind) = rules.grouping.kind() else {
                        continue;
                    };
                    headings += 1;
                    let id = self.open_group(node, page, kind, headings, title);
                    self.arena.get_mut(id).description = description;
                    group = Some(OpenGroup {
                        node: id,
                        module_taken: false,
                    });
                    continue;
                }
                ListingItem::Note(text) => {
                    let target = group.as_ref().map_or(node, |g| g.node);
                    append_description(self.arena.get_mut(target), &text);
                    continue;
                }
                ListingItem::Link(anchor) => anchor,
            };

            if rules.skip_sections && self.language.is_section_title(&anchor.label.title) {
                tracing::debug!("Skipping section link '{}' on {}", anchor.label.title, page.url);
                self.frontier.stats_mut().links_skipped += 1;
                continue;
            }

            let Some((url, class)) = self.frontier.classify(&anchor.url) else {
                continue;
            };

            match class {
                UrlClass::Page(kind) if rules.follows.contains(&kind) => {
                    let parent = group.as_ref().map_or(node, |g| g.node);
                    if kind == PageKind::Oucontent && rules.grouping == Grouping::Subjects {
                        if let Some(open) = group.as_mut() {
                            if open.module_taken {
                                tracing::debug!("Skipping section file {} on {}", url, page.url);
                                self.frontier.stats_mut().links_skipped += 1;
                                continue;
                            }
                            open.module_taken = true;
                        }
                    }
                    self.enqueue_child(parent, url, kind, anchor.label);
                }
                UrlClass::Ignored(reason) => {
                    tracing::debug!("Ignoring link {} on {} ({})", url, page.url, reason);
                    self.frontier.stats_mut().links_ignored += 1;
                }
                _ => {
                    tracing::debug!("Skipping link {} on page {}", url, page.url);
                    self.frontier.stats_mut().links_skipped += 1;
                }
            }
        }
    }

    async fn handle_resource(&mut self, node: NodeId, page: &FetchedPage) {
        let Some(body) = page.body.as_deref() else {
            // The resource URL answered with the file itself
            let current = self.arena.get_mut(node);
            current.content_type = Some(page.content_type.clone());
            current.file_url = Some(page.final_url.clone());
            return;
        };

        let (title, candidates) = {
            let document = Html::parse_document(body);
            let selectors = Region::ResourceContent.selectors(self.language.profile());
            let region = region_or_body(&document, selectors, page.url.as_str());
            let base = page.base_url();
            let mut candidates: Vec<String> = region_anchors(&region, &base)
                .into_iter()
                .map(|anchor| anchor.url)
                .collect();
            for (css, attr) in EMBED_SOURCES {
                if let Ok(selector) = Selector::parse(css) {
                    candidates.extend(
                        region
                            .select(&selector)
                            .filter_map(|el| el.value().attr(attr))
                            .filter_map(|src| resolve_link(src, &base)),
                    );
                }
            }
            (page_title(&document), candidates)
        };
        self.set_title_if_empty(node, title);

        for candidate in candidates {
            let Some((url, class)) = self.frontier.classify(&candidate) else {
                continue;
            };
            if matches!(class, UrlClass::Ignored(_)) || url == page.url {
                continue;
            }

            self.frontier.stats_mut().probes += 1;
            match self.fetcher.probe(url.as_str()).await {
                ProbeResult::Reachable {
                    final_url,
                    content_type,
                } if !content_type.as_deref().map(crate::crawler::is_html).unwrap_or(false) => {
                    tracing::debug!("Resource {} resolves to {}", page.url, final_url);
                    self.frontier.mark_visited(&url);
                    let current = self.arena.get_mut(node);
                    current.content_type = content_type;
                    current.file_url = Some(final_url);
                    return;
                }
                ProbeResult::Reachable { .. } => {}
                ProbeResult::Failed { error } => {
                    tracing::warn!("Probe of {} failed: {}", url, error);
                }
            }
        }

        tracing::warn!("No downloadable file found on resource page {}", page.url);
    }

    async fn handle_audio_sections(&mut self, node: NodeId, page: &FetchedPage, grouped: bool) {
        let Some(body) = page.body.as_deref() else {
            return;
        };
        let (title, sections) = scan_audio_sections(body, page, self.language.profile());
        self.set_title_if_empty(node, title);

        for section in sections {
            if section.anchors.is_empty() {
                continue;
            }

            let parent = if grouped && !section.title.is_empty() {
                let mut group = CrawlNode::new(
                    format!("{}#section-{}", page.url, section.number),
                    PageKind::Subject,
                    section.title.clone(),
                );
                group.language = Some(self.language);
                self.arena.append_child(node, group)
            } else {
                node
            };

            for anchor in section.anchors {
                self.handle_audio_link(parent, anchor, &section.title).await;
            }
        }
    }

    /// Probes one link of an audio section: files become media nodes, wrapper
    /// pages are queued as resources
    ///
    /// Either way the node takes the link's position among its siblings.
    async fn handle_audio_link(&mut self, parent: NodeId, anchor: Anchor, section_title: &str) {
        let Some((url, class)) = self.frontier.classify(&anchor.url) else {
            return;
        };
        if let UrlClass::Ignored(reason) = class {
            tracing::debug!("Ignoring audio link {} ({})", url, reason);
            self.frontier.stats_mut().links_ignored += 1;
            return;
        }
        if self.frontier.is_visited(&url) {
            self.frontier.stats_mut().links_duplicate += 1;
            return;
        }

        let label = LinkLabel {
            title: if anchor.label.title.is_empty() {
                section_title.to_string()
            } else {
                anchor.label.title
            },
            hidden_subspan_text: anchor.label.hidden_subspan_text,
        };

        self.frontier.stats_mut().probes += 1;
        let probe = self.fetcher.probe(url.as_str()).await;
        if probe.is_html() {
            self.enqueue_child(parent, url, PageKind::Resource, label);
            return;
        }

        match probe {
            ProbeResult::Reachable {
                final_url,
                content_type,
            } => {
                let mut media = CrawlNode::new(url.as_str(), PageKind::MediaFile, label.title);
                media.hidden_subspan_text = label.hidden_subspan_text;
                media.language = Some(self.language);
                media.content_type = content_type;
                media.file_url = Some(final_url);
                self.arena.append_child(parent, media);
                self.frontier.mark_visited(&url);
                self.frontier.stats_mut().media_files += 1;
            }
            ProbeResult::Failed { error } => {
                tracing::warn!("Probe of audio link {} failed: {}", url, error);
            }
        }
    }
}

/// Listing handler settings taken from the handler table
#[derive(Debug, Clone, Copy)]
struct ListingRules {
    region: Region,
    follows: &'static [PageKind],
    skip_sections: bool,
    description: DescriptionRule,
    grouping: Grouping,
}

fn append_description(node: &mut CrawlNode, text: &str) {
    node.description = Some(match node.description.take() {
        Some(existing) if !existing.is_empty() => format!("{} {}", existing, text),
        _ => text.to_string(),
    });
}

fn scan_listing(
    body: &str,
    page: &FetchedPage,
    selectors: &[&str],
    rule: DescriptionRule,
    grouping: Grouping,
) -> ListingScan {
    let document = Html::parse_document(body);
    let region = region_or_body(&document, selectors, page.url.as_str());
    let base = page.base_url();

    let description = match rule {
        DescriptionRule::FirstLabel => first_text(&region, "li.activity.modtype_label"),
        DescriptionRule::LongActivity => first_text(&region, "li.activity")
            .or_else(|| first_text(&region, "p"))
            .filter(|text| text.chars().count() >= MIN_DESCRIPTION_CHARS),
    };

    let items = match grouping {
        Grouping::Flat => region_anchors(&region, &base)
            .into_iter()
            .map(ListingItem::Link)
            .collect(),
        Grouping::Categories => category_items(&region, &base),
        Grouping::Subjects => subject_items(&region, &base, description.as_deref(), page.url.as_str()),
    };

    ListingScan {
        title: page_title(&document),
        description,
        items,
    }
}

/// Walks the language page in document order
///
/// The first label carries the channel description and the footer label
/// links back to the TESSA home page; neither opens a category. Links inside
/// labels are not followed.
fn category_items(region: &ElementRef, base: &Url) -> Vec<ListingItem> {
    let Ok(selector) = Selector::parse("li.modtype_label, li.modtype_heading, a") else {
        return Vec::new();
    };

    let mut items = Vec::new();
    let mut description_seen = false;
    for element in region.select(&selector) {
        if element.value().name() == "a" {
            if !within_class(&element, LABEL_CLASS) && !within_class(&element, HEADING_CLASS) {
                items.extend(anchor_from(&element, base).map(ListingItem::Link));
            }
            continue;
        }

        let is_label = element.value().classes().any(|c| c == LABEL_CLASS);
        if is_label && !description_seen {
            description_seen = true;
            continue;
        }
        if links_to(&element, TESSA_HOME_URL) {
            tracing::debug!("Skipping footer label on {}", base);
            continue;
        }
        items.extend(label_item(&element));
    }
    items
}

/// Reads a label activity as a heading, or as a note when it has no title element
fn label_item(label: &ElementRef) -> Option<ListingItem> {
    let paragraphs: Vec<String> = match Selector::parse("p") {
        Ok(selector) => label
            .select(&selector)
            .map(|p| element_text(&p))
            .filter(|text| !text.is_empty())
            .collect(),
        Err(_) => Vec::new(),
    };

    let heading = LABEL_HEADINGS.iter().find_map(|css| {
        let selector = Selector::parse(css).ok()?;
        label
            .select(&selector)
            .map(|el| element_text(&el))
            .find(|text| !text.is_empty())
    });

    match heading {
        Some(title) => {
            let rest: Vec<&str> = paragraphs
                .iter()
                .map(|p| p.strip_prefix(title.as_str()).unwrap_or(p).trim())
                .filter(|p| !p.is_empty())
                .collect();
            let description = (!rest.is_empty()).then(|| rest.join(" "));
            Some(ListingItem::Heading { title, description })
        }
        None => {
            let text = if paragraphs.is_empty() {
                element_text(label)
            } else {
                paragraphs.join(" ")
            };
            (!text.is_empty()).then_some(ListingItem::Note(text))
        }
    }
}

/// Walks a subpage in document order
///
/// With several course sections, each titled section opens a subject and
/// untitled ones (the footer) are dropped. With one section or none, label
/// activities open subjects instead; the label after a subject heading
/// introduces the module's per-section files and is dropped too.
fn subject_items(region: &ElementRef, base: &Url, description: Option<&str>, page_key: &str) -> Vec<ListingItem> {
    let Ok(section_selector) = Selector::parse("li.section") else {
        return Vec::new();
    };
    let sections: Vec<ElementRef> = region.select(&section_selector).collect();

    if sections.len() > 1 {
        let mut items = Vec::new();
        for section in sections {
            let heading = first_text(&section, "h3.sectionname").or_else(|| first_text(&section, "h4"));
            let Some(title) = heading else {
                if links_to(&section, TESSA_HOME_URL) {
                    tracing::debug!("Skipping footer section on {}", page_key);
                } else {
                    tracing::debug!("Skipping untitled section on {}", page_key);
                }
                continue;
            };
            items.push(ListingItem::Heading {
                title,
                description: None,
            });
            items.extend(
                region_anchors(&section, base)
                    .into_iter()
                    .filter(|anchor| anchor.url != page_key)
                    .map(ListingItem::Link),
            );
        }
        return items;
    }

    let Ok(selector) = Selector::parse("li.modtype_label, a") else {
        return Vec::new();
    };
    let mut items = Vec::new();
    let mut expect_files_label = false;
    for element in region.select(&selector) {
        if element.value().name() == "a" {
            if !within_class(&element, LABEL_CLASS) {
                items.extend(anchor_from(&element, base).map(ListingItem::Link));
            }
            continue;
        }

        let text = element_text(&element);
        if text.is_empty() || Some(text.as_str()) == description || links_to(&element, TESSA_HOME_URL) {
            continue;
        }
        if expect_files_label {
            tracing::debug!("Skipping section files label '{}' on {}", text, page_key);
            expect_files_label = false;
        } else {
            items.push(ListingItem::Heading {
                title: text,
                description: None,
            });
            expect_files_label = true;
        }
    }
    items
}

fn scan_audio_sections(
    body: &str,
    page: &FetchedPage,
    profile: &LanguageProfile,
) -> (Option<String>, Vec<AudioSection>) {
    let document = Html::parse_document(body);
    let region = region_or_body(&document, Region::PageContent.selectors(profile), page.url.as_str());
    let base = page.base_url();
    let page_key = page.url.as_str();

    let Ok(section_selector) = Selector::parse("li.section") else {
        return (page_title(&document), Vec::new());
    };

    let mut sections: Vec<AudioSection> = region
        .select(&section_selector)
        .enumerate()
        .map(|(index, section)| {
            let number = section
                .value()
                .attr("id")
                .and_then(|id| id.strip_prefix("section-"))
                .and_then(|n| n.parse().ok())
                .unwrap_or(index + 1);
            let title = first_text(&section, ".sectionname").unwrap_or_default();
            let anchors = region_anchors(&section, &base)
                .into_iter()
                .filter(|anchor| anchor.url != page_key)
                .collect();
            AudioSection {
                number,
                title: normalize_text(&title),
                anchors,
            }
        })
        .collect();

    if sections.is_empty() {
        tracing::warn!("No sections on audio page {}, scanning the whole region", page.url);
        sections.push(AudioSection {
            number: 0,
            title: String::new(),
            anchors: region_anchors(&region, &base),
        });
    }

    (page_title(&document), sections)
}
