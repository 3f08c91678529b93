use crate::config::types::{CacheConfig, Config, CrawlerConfig, OutputConfig, SiteConfig, UserAgentConfig};
use crate::site::Language;
use crate::{ConfigError, ConfigResult};
use regex::Regex;
use url::Url;

/// Validates every section of a parsed configuration
///
/// The first rejected value is reported; nothing is checked against the network.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_site_config(&config.site)?;
    validate_cache_config(&config.cache)?;
    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> ConfigResult<()> {
    // page_limit = 0 is allowed: it produces a root-only tree
    if config.request_timeout < 1 {
        return Err(ConfigError::Validation(format!(
            "request_timeout must be >= 1 second, got {}",
            config.request_timeout
        )));
    }

    Ok(())
}

fn validate_user_agent_config(config: &UserAgentConfig) -> ConfigResult<()> {
    let name = &config.crawler_name;
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '-') {
        return Err(ConfigError::Validation(format!(
            "crawler_name must be non-empty and use only letters, digits and hyphens, got '{}'",
            name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> ConfigResult<()> {
    for (name, value) in [
        ("trees_dir", &config.trees_dir),
        ("downloads_dir", &config.downloads_dir),
        ("report_path", &config.report_path),
    ] {
        if value.is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    Ok(())
}

/// Validates site scoping: domains, ignore patterns and entry overrides
fn validate_site_config(config: &SiteConfig) -> ConfigResult<()> {
    if config.source_domains.is_empty() {
        return Err(ConfigError::Validation(
            "source_domains must list at least one domain".to_string(),
        ));
    }

    for pattern in &config.source_domains {
        validate_domain_pattern(pattern)?;
    }

    for pattern in &config.extra_ignore_patterns {
        Regex::new(pattern).map_err(|e| {
            ConfigError::InvalidPattern(format!("Invalid ignore pattern '{}': {}", pattern, e))
        })?;
    }

    for (code, url) in &config.entry_urls {
        code.parse::<Language>().map_err(|_| {
            ConfigError::Validation(format!("Unknown language code in entry-urls: '{}'", code))
        })?;
        Url::parse(url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid entry URL '{}': {}", url, e))
        })?;
    }

    Ok(())
}

/// Validates cache configuration
fn validate_cache_config(config: &CacheConfig) -> ConfigResult<()> {
    if config.enabled && config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "cache database_path cannot be empty when the cache is enabled".to_string(),
        ));
    }

    if config.max_entries < 1 {
        return Err(ConfigError::Validation(format!(
            "cache max_entries must be >= 1, got {}",
            config.max_entries
        )));
    }

    for pattern in &config.forever_domains {
        validate_domain_pattern(pattern)?;
    }

    Ok(())
}

/// Checks a `source-domains` or `forever-domains` entry
///
/// Accepts a host name or IP literal, optionally prefixed with `*.`. Every
/// dot-separated label must be non-empty, alphanumeric or hyphenated, and
/// must not begin or end with a hyphen. Single-label hosts are rejected.
fn validate_domain_pattern(pattern: &str) -> ConfigResult<()> {
    let host = pattern.strip_prefix("*.").unwrap_or(pattern);
    let invalid = |reason: &str| ConfigError::InvalidPattern(format!("Domain pattern '{}' {}", pattern, reason));

    if host.is_empty() {
        return Err(invalid("is empty"));
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return Err(invalid("needs at least two labels (e.g. 'www.open.edu')"));
    }

    for label in labels {
        if label.is_empty() {
            return Err(invalid("has an empty label"));
        }
        if !label.chars().all(|c| c.is_alphanumeric() || c == '-') {
            return Err(invalid("contains invalid characters"));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(invalid("has a label starting or ending with '-'"));
        }
    }

    Ok(())
}

fn validate_email(email: &str) -> ConfigResult<()> {
    let well_formed = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.contains('@') && domain.split('.').filter(|l| !l.is_empty()).count() >= 2
        }
        None => false,
    };

    if well_formed {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("Invalid contact_email: '{}'", email)))
    }
}
