use crate::config::SiteConfig;
use crate::site::{Language, DEFAULT_IGNORE_PATTERNS, DEFAULT_IGNORE_URLS};
use crate::tree::PageKind;
use crate::url::{canonicalize_url, domain_matches_any, page_id};
use crate::ConfigError;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use url::Url;

/// Path patterns tried in order; the first match decides the kind
const KIND_PATTERNS: &[(&str, PageKind)] = &[
    (r"mod/subpage/", PageKind::Subpage),
    (r"mod/oucontent/", PageKind::Oucontent),
    (r"mod/resource/", PageKind::Resource),
];

/// Result of classifying a canonical URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlClass {
    /// A page kind the crawler has a handler for
    Page(PageKind),
    /// In scope, but not a known page kind
    Unclassified,
    /// Never fetched
    Ignored(IgnoreReason),
}

/// Why a URL was ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IgnoreReason {
    /// On the exact-URL ignore list
    ExactUrl,
    /// Matches one of the ignore regexes
    Pattern,
    /// Host outside the configured source domains
    ForeignDomain,
    /// Entry page of another language edition
    SiblingLanguage,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::ExactUrl => "ignore list",
            Self::Pattern => "ignore pattern",
            Self::ForeignDomain => "foreign domain",
            Self::SiblingLanguage => "sibling language",
        };
        f.write_str(label)
    }
}

/// Maps canonical URLs to page kinds for one language crawl
///
/// Built once per crawl: the entry pages of the other three languages are
/// added to the ignore set so the crawl stays inside its own language tree.
#[derive(Debug)]
pub struct UrlClassifier {
    source_domains: Vec<String>,
    ignore_urls: HashSet<String>,
    sibling_urls: HashSet<String>,
    ignore_patterns: Vec<Regex>,
    kind_patterns: Vec<(Regex, PageKind)>,
    audio_resource_ids: HashSet<String>,
    audio_topic_ids: HashSet<String>,
}

impl UrlClassifier {
    /// Builds a classifier for `language`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidPattern` if an ignore pattern does not compile
    /// and `ConfigError::InvalidUrl` if an ignore or entry URL cannot be canonicalized.
    pub fn new(
        site: &SiteConfig,
        language: Language,
        entry_urls: &BTreeMap<Language, String>,
    ) -> Result<Self, ConfigError> {
        let mut ignore_urls = HashSet::new();
        let listed = DEFAULT_IGNORE_URLS
            .iter()
            .copied()
            .chain(site.extra_ignore_urls.iter().map(String::as_str));
        for raw in listed {
            ignore_urls.insert(canonical_key(raw)?);
        }

        let mut sibling_urls = HashSet::new();
        for (lang, entry) in entry_urls {
            if *lang != language {
                sibling_urls.insert(canonical_key(entry)?);
            }
        }

        let ignore_patterns = DEFAULT_IGNORE_PATTERNS
            .iter()
            .copied()
            .chain(site.extra_ignore_patterns.iter().map(String::as_str))
            .map(|pattern| {
                Regex::new(pattern)
                    .map_err(|e| ConfigError::InvalidPattern(format!("{}: {}", pattern, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let kind_patterns = KIND_PATTERNS
            .iter()
            .map(|(pattern, kind)| {
                Regex::new(pattern)
                    .map(|re| (re, *kind))
                    .map_err(|e| ConfigError::InvalidPattern(format!("{}: {}", pattern, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            source_domains: site.source_domains.clone(),
            ignore_urls,
            sibling_urls,
            ignore_patterns,
            kind_patterns,
            audio_resource_ids: site.audio_resource_subpages.iter().cloned().collect(),
            audio_topic_ids: site.audio_topic_subpages.iter().cloned().collect(),
        })
    }

    /// Returns the reason `url` must not be fetched, if any
    pub fn ignore_reason(&self, url: &Url) -> Option<IgnoreReason> {
        if !domain_matches_any(url, &self.source_domains) {
            return Some(IgnoreReason::ForeignDomain);
        }
        let key = url.as_str();
        if self.sibling_urls.contains(key) {
            return Some(IgnoreReason::SiblingLanguage);
        }
        if self.ignore_urls.contains(key) {
            return Some(IgnoreReason::ExactUrl);
        }
        if self.ignore_patterns.iter().any(|re| re.is_match(key)) {
            return Some(IgnoreReason::Pattern);
        }
        None
    }

    /// Classifies a canonical URL
    ///
    /// Ignore rules are checked first. A subpage whose id is on one of the audio
    /// allow-lists gets the matching audio kind.
    pub fn classify(&self, url: &Url) -> UrlClass {
        if let Some(reason) = self.ignore_reason(url) {
            return UrlClass::Ignored(reason);
        }

        let kind = self
            .kind_patterns
            .iter()
            .find(|(re, _)| re.is_match(url.as_str()))
            .map(|(_, kind)| *kind);

        match kind {
            Some(PageKind::Subpage) => UrlClass::Page(self.subpage_kind(url)),
            Some(kind) => UrlClass::Page(kind),
            None => UrlClass::Unclassified,
        }
    }

    fn subpage_kind(&self, url: &Url) -> PageKind {
        match page_id(url) {
            Some(id) if self.audio_resource_ids.contains(&id) => PageKind::AudioResourcesSubpage,
            Some(id) if self.audio_topic_ids.contains(&id) => PageKind::AudioTopicSubpage,
            _ => PageKind::Subpage,
        }
    }
}

fn canonical_key(raw: &str) -> Result<String, ConfigError> {
    canonicalize_url(raw)
        .map(|url| url.to_string())
        .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", raw, e)))
}
