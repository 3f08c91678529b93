//! Configuration module for Tessa-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use tessa_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Crawler will fetch at most {} pages", config.crawler.page_limit);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CacheConfig, Config, CrawlerConfig, OutputConfig, SiteConfig, UnknownKindPolicy,
    UserAgentConfig,
};

// Re-export parser functions
pub use parser::{hash_config, load_config, load_config_with_hash, parse_config};
