//! URL handling module for Tessa-Harvest
//!
//! This module provides URL canonicalization, domain extraction, wildcard
//! matching, and page-kind classification of links found on the site.

mod classify;
mod domain;
mod matcher;
mod normalize;

// Re-export main functions
pub use classify::{IgnoreReason, UrlClass, UrlClassifier};
pub use domain::{domain_matches_any, extract_domain};
pub use matcher::matches_wildcard;
pub use normalize::{canonicalize_url, page_id};
