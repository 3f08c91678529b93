use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigResult;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Parses and validates configuration text
///
/// # Arguments
///
/// * `content` - TOML source
///
/// # Returns
///
/// * `Ok(Config)` - Parsed configuration that passed validation
/// * `Err(ConfigError)` - Invalid TOML or a rejected value
pub fn parse_config(content: &str) -> ConfigResult<Config> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Loads the configuration file at `path`
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use tessa_harvest::config::load_config;
///
/// let config = load_config(Path::new("harvest.toml")).unwrap();
/// println!("Page limit: {}", config.crawler.page_limit);
/// ```
pub fn load_config(path: &Path) -> ConfigResult<Config> {
    parse_config(&std::fs::read_to_string(path)?)
}

/// Hex SHA-256 of configuration text
pub fn hash_config(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Loads a configuration together with the hash of the exact text it came from
///
/// The file is read once, so the hash always matches the parsed settings.
///
/// # Returns
///
/// * `Ok((Config, String))` - Configuration and hex SHA-256 of the file
/// * `Err(ConfigError)` - The file could not be read, parsed or validated
pub fn load_config_with_hash(path: &Path) -> ConfigResult<(Config, String)> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    Ok((config, hash_config(&content)))
}
