//! Node kinds and the crawl node
//!
//! A node's kind starts out as the raw tag the crawler assigned when the link
//! was enqueued, is rewritten to a canonical kind by restructuring, and falls
//! back to `Unknown` when neither table recognizes it (for example a JSON tree
//! written by a newer crawler).

use crate::site::Language;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw classification assigned at crawl time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PageKind {
    /// Main page of a language edition
    LanguageRoot,
    /// Moodle subpage aggregating modules of one sub-topic
    Subpage,
    /// OU content document (a module or a standalone page)
    Oucontent,
    /// Moodle resource, usually an interstitial in front of a file
    Resource,
    /// Subpage listing audio resources per section
    AudioResourcesSubpage,
    /// Subpage grouping audio topics per section
    AudioTopicSubpage,
    /// Direct link to a media file found by a content-type probe
    MediaFile,
    /// Heading on the language main page grouping the links below it
    Category,
    /// Heading on a subpage grouping one subject's module and resources
    Subject,
}

impl PageKind {
    pub const ALL: [PageKind; 9] = [
        PageKind::LanguageRoot,
        PageKind::Subpage,
        PageKind::Oucontent,
        PageKind::Resource,
        PageKind::AudioResourcesSubpage,
        PageKind::AudioTopicSubpage,
        PageKind::MediaFile,
        PageKind::Category,
        PageKind::Subject,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LanguageRoot => "lang_root",
            Self::Subpage => "subpage",
            Self::Oucontent => "oucontent",
            Self::Resource => "resource",
            Self::AudioResourcesSubpage => "audio_resources_subpage",
            Self::AudioTopicSubpage => "audio_topic_subpage",
            Self::MediaFile => "media_file",
            Self::Category => "category",
            Self::Subject => "subject",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }

    /// Kinds created from a heading on the parent page rather than fetched
    pub fn is_grouping(&self) -> bool {
        matches!(self, Self::Category | Self::Subject)
    }
}

/// Normalized classification produced by restructuring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalKind {
    LanguageTree,
    SubpageTopic,
    /// Standalone document directly under the language tree
    ContentPage,
    /// Module that is part of a subpage's curriculum
    ContentModule,
    AudioResource,
    PdfDocument,
    UnsupportedFormat,
    /// Unrecognized node kept for manual review
    Unclassified,
}

impl CanonicalKind {
    pub const ALL: [CanonicalKind; 8] = [
        CanonicalKind::LanguageTree,
        CanonicalKind::SubpageTopic,
        CanonicalKind::ContentPage,
        CanonicalKind::ContentModule,
        CanonicalKind::AudioResource,
        CanonicalKind::PdfDocument,
        CanonicalKind::UnsupportedFormat,
        CanonicalKind::Unclassified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LanguageTree => "language_tree",
            Self::SubpageTopic => "subpage_topic",
            Self::ContentPage => "content_page",
            Self::ContentModule => "content_module",
            Self::AudioResource => "audio_resource",
            Self::PdfDocument => "pdf_document",
            Self::UnsupportedFormat => "unsupported_format",
            Self::Unclassified => "unclassified",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }

    /// Kinds the downloader packages as HTML
    pub fn is_content(&self) -> bool {
        matches!(self, Self::ContentPage | Self::ContentModule)
    }
}

/// Kind tag of a node, raw or canonical
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
    Raw(PageKind),
    Canonical(CanonicalKind),
    Unknown(String),
}

impl NodeKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Raw(kind) => kind.as_str(),
            Self::Canonical(kind) => kind.as_str(),
            Self::Unknown(tag) => tag,
        }
    }
}

impl From<String> for NodeKind {
    fn from(tag: String) -> Self {
        if let Some(kind) = PageKind::from_tag(&tag) {
            Self::Raw(kind)
        } else if let Some(kind) = CanonicalKind::from_tag(&tag) {
            Self::Canonical(kind)
        } else {
            Self::Unknown(tag)
        }
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        kind.as_str().to_string()
    }
}

impl From<PageKind> for NodeKind {
    fn from(kind: PageKind) -> Self {
        Self::Raw(kind)
    }
}

impl From<CanonicalKind> for NodeKind {
    fn from(kind: CanonicalKind) -> Self {
        Self::Canonical(kind)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node in the raw or restructured crawl tree
///
/// Children are owned exclusively by their parent, in document order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlNode {
    /// Canonical absolute URL
    pub url: String,

    pub kind: NodeKind,

    #[serde(default)]
    pub title: String,

    /// Accessibility hint that was nested in the link label (e.g. "Module")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden_subspan_text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Content type sniffed for media nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// Direct download location for media nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,

    #[serde(default)]
    pub children: Vec<CrawlNode>,
}

impl CrawlNode {
    /// Creates a childless node
    pub fn new(url: impl Into<String>, kind: impl Into<NodeKind>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: kind.into(),
            title: title.into(),
            hidden_subspan_text: None,
            language: None,
            description: None,
            content_type: None,
            file_url: None,
            source_id: None,
            children: Vec::new(),
        }
    }

    /// Builder-style helper that appends a child
    pub fn with_child(mut self, child: CrawlNode) -> Self {
        self.children.push(child);
        self
    }

    /// Iterates over this node and all descendants in document (pre-)order
    pub fn iter(&self) -> PreOrder<'_> {
        PreOrder { stack: vec![self] }
    }

    /// Total number of nodes in this subtree, including itself
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Always false: a subtree contains at least its own root
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Pre-order iterator over a crawl tree
pub struct PreOrder<'a> {
    stack: Vec<&'a CrawlNode>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a CrawlNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}
