//! Persistent HTTP response cache
//!
//! Repeated development runs hit the same few hundred pages; this module keeps
//! their responses in SQLite so re-crawls are cheap:
//! - Entries on first-party domains never expire
//! - Other entries expire after a configurable age
//! - The table is bounded, evicting least-recently-used rows

mod policy;
mod schema;
mod sqlite;

pub use policy::CachePolicy;
pub use sqlite::ResponseCache;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt cache entry: {0}")]
    Corrupt(String),
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Request kind a cache entry answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMethod {
    Get,
    Head,
}

impl CacheMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
        }
    }
}

/// A stored response
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub fetched_at: DateTime<Utc>,
}
