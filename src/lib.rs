//! Tessa-Harvest: a crawler and packager for the TESSA course site
//!
//! This crate crawls the four language editions of the TESSA teacher-education
//! collection, builds a typed tree of subpages, modules and media resources,
//! normalizes that tree into canonical content kinds, and packages each content
//! module into a self-contained, deterministic archive.

pub mod cache;
pub mod config;
pub mod crawler;
pub mod download;
pub mod output;
pub mod site;
pub mod tree;
pub mod url;

use thiserror::Error;

/// Error type of the crawl and download stages
///
/// Failed page fetches are not errors: they travel as `FetchResult` values and
/// only become a `HarvestError` where a stage cannot continue without the page.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Request to {url} failed: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Rejected URL: {0}")]
    UrlError(#[from] UrlError),

    #[error("Unparseable URL: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Response cache failure: {0}")]
    Cache(#[from] cache::CacheError),

    #[error("Unexpected page structure at {url}: {message}")]
    HtmlStructure { url: String, message: String },

    #[error("Unknown language code: {0}")]
    UnknownLanguage(String),

    #[error("Internal invariant violated: {0}")]
    InvariantViolation(String),

    #[error("JSON artifact error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Zip archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Problems with the TOML configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Rejected configuration value: {0}")]
    Validation(String),

    #[error("Bad URL in configuration: {0}")]
    InvalidUrl(String),

    #[error("Bad pattern in configuration: {0}")]
    InvalidPattern(String),
}

/// Reasons a link cannot become a frontier key
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Unparseable URL: {0}")]
    Parse(String),

    #[error("Unsupported URL scheme: {0}")]
    InvalidScheme(String),

    #[error("URL has no host")]
    MissingDomain,
}

pub type Result<T> = std::result::Result<T, HarvestError>;
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
pub type UrlResult<T> = std::result::Result<T, UrlError>;

pub use config::Config;
pub use site::Language;
pub use tree::{CanonicalKind, CanonicalNode, CrawlNode, NodeKind, PageKind};
pub use crate::url::{canonicalize_url, UrlClass, UrlClassifier};
