use crate::site::{Language, DEFAULT_SOURCE_DOMAINS};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for Tessa-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Config {
    /// Entry URL for a language, honoring overrides from `[site.entry-urls]`
    pub fn entry_url(&self, lang: Language) -> String {
        self.site
            .entry_urls
            .get(lang.code())
            .cloned()
            .unwrap_or_else(|| lang.default_entry_url())
    }

    /// Entry URLs of every language edition, keyed by language
    pub fn entry_urls(&self) -> BTreeMap<Language, String> {
        Language::ALL
            .iter()
            .map(|lang| (*lang, self.entry_url(*lang)))
            .collect()
    }
}

/// What to do with nodes whose kind restructuring could not recognize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownKindPolicy {
    /// Log and drop them from the canonical tree
    #[default]
    Exclude,
    /// Log and hand them to packaging as-is
    Keep,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of pages fetched per language
    #[serde(rename = "page-limit")]
    pub page_limit: usize,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout", default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Handling of unrecognized node kinds
    #[serde(rename = "unknown-kinds", default)]
    pub unknown_kinds: UnknownKindPolicy,
}

fn default_request_timeout() -> u64 {
    30
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving the raw and restructured JSON trees
    #[serde(rename = "trees-dir")]
    pub trees_dir: String,

    /// Directory receiving packaged content
    #[serde(rename = "downloads-dir")]
    pub downloads_dir: String,

    /// Path to the markdown crawl report
    #[serde(rename = "report-path")]
    pub report_path: String,
}

/// Site scoping configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Domain patterns (e.g., "www.open.edu" or "*.tessafrica.net") links may point into
    #[serde(rename = "source-domains", default = "default_source_domains")]
    pub source_domains: Vec<String>,

    /// Exact URLs to skip in addition to the built-in list
    #[serde(rename = "extra-ignore-urls", default)]
    pub extra_ignore_urls: Vec<String>,

    /// Regex patterns to skip in addition to the built-in list
    #[serde(rename = "extra-ignore-patterns", default)]
    pub extra_ignore_patterns: Vec<String>,

    /// Subpage ids whose sections list audio resources
    #[serde(rename = "audio-resource-subpages", default)]
    pub audio_resource_subpages: Vec<String>,

    /// Subpage ids whose sections group audio topics
    #[serde(rename = "audio-topic-subpages", default)]
    pub audio_topic_subpages: Vec<String>,

    /// Per-language overrides of the entry page
    #[serde(rename = "entry-urls", default)]
    pub entry_urls: BTreeMap<String, String>,
}

fn default_source_domains() -> Vec<String> {
    DEFAULT_SOURCE_DOMAINS.iter().map(|d| d.to_string()).collect()
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            source_domains: default_source_domains(),
            extra_ignore_urls: Vec::new(),
            extra_ignore_patterns: Vec::new(),
            audio_resource_subpages: Vec::new(),
            audio_topic_subpages: Vec::new(),
            entry_urls: BTreeMap::new(),
        }
    }
}

/// HTTP response cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Whether responses are cached at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Path to the SQLite cache file
    #[serde(rename = "database-path", default = "default_cache_path")]
    pub database_path: String,

    /// Domain patterns whose responses never expire
    #[serde(rename = "forever-domains", default = "default_forever_domains")]
    pub forever_domains: Vec<String>,

    /// Freshness lifetime for every other domain (seconds)
    #[serde(rename = "max-age", default = "default_max_age")]
    pub max_age: u64,

    /// Maximum number of cached responses before least-recently-used eviction
    #[serde(rename = "max-entries", default = "default_max_entries")]
    pub max_entries: u64,
}

fn default_true() -> bool {
    true
}

fn default_cache_path() -> String {
    ".webcache.sqlite".to_string()
}

fn default_forever_domains() -> Vec<String> {
    vec!["www.open.edu".to_string()]
}

fn default_max_age() -> u64 {
    86_400
}

fn default_max_entries() -> u64 {
    20_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            database_path: default_cache_path(),
            forever_domains: default_forever_domains(),
            max_age: default_max_age(),
            max_entries: default_max_entries(),
        }
    }
}
