//! Output module for persisted trees and crawl reports
//!
//! This module handles:
//! - Writing and reading the per-language JSON tree artifacts
//! - The package manifest produced by the download stage
//! - Crawl statistics and the markdown report

mod json;
mod markdown;
pub mod stats;

pub use json::{
    canonical_tree_path, manifest_path, raw_tree_path, read_canonical_tree, read_json, read_raw_tree,
    write_canonical_tree, write_json, write_manifest, write_raw_tree,
};
pub use markdown::{format_markdown_report, write_markdown_report};
pub use stats::{print_statistics, LanguageReport};
