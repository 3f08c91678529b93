//! TESSA harvest main entry point
//!
//! This is the command-line interface for crawling the TESSA editions and
//! packaging their content.

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tessa_harvest::cache::ResponseCache;
use tessa_harvest::config::{load_config_with_hash, Config};
use tessa_harvest::crawler::{build_http_client, crawl_language, Fetcher, HttpFetcher};
use tessa_harvest::download::Downloader;
use tessa_harvest::output::{
    print_statistics, read_canonical_tree, write_canonical_tree, write_manifest, write_markdown_report,
    write_raw_tree, LanguageReport,
};
use tessa_harvest::tree::{normalize_tree, to_canonical};
use tessa_harvest::Language;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// TESSA harvest: crawls the TESSA Moodle site and packages its content
///
/// The crawl stage walks one language edition into a raw tree, restructures
/// it and writes the canonical tree. The download stage turns every content
/// node of that tree into a self-contained HTML archive.
#[derive(Parser, Debug)]
#[command(name = "tessa-harvest")]
#[command(version = "1.0.0")]
#[command(about = "Crawler and packager for the TESSA Moodle site", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Language edition to process (en, fr, ar, sw or all)
    #[arg(long, default_value = "all", value_parser = parse_languages)]
    lang: Languages,

    /// Pipeline stage to run
    #[arg(long, value_enum, default_value_t = Stage::All)]
    stage: Stage,

    /// Maximum number of pages to fetch per language (overrides the config)
    #[arg(long)]
    limit: Option<usize>,

    /// Bypass the response cache
    #[arg(long)]
    no_cache: bool,

    /// Validate config and show what would be crawled without fetching anything
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Stage {
    /// Crawl and restructure only
    Crawl,
    /// Package content from a previously written canonical tree
    Download,
    /// Crawl, then package
    All,
}

impl Stage {
    fn crawls(self) -> bool {
        matches!(self, Stage::Crawl | Stage::All)
    }

    fn downloads(self) -> bool {
        matches!(self, Stage::Download | Stage::All)
    }
}

#[derive(Debug, Clone)]
struct Languages(Vec<Language>);

fn parse_languages(value: &str) -> Result<Languages, String> {
    if value.trim().eq_ignore_ascii_case("all") {
        return Ok(Languages(Language::ALL.to_vec()));
    }
    value
        .parse::<Language>()
        .map(|lang| Languages(vec![lang]))
        .map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    info!("Loaded configuration (hash: {})", config_hash);

    let languages = cli.lang.0;
    let limit = cli.limit.unwrap_or(config.crawler.page_limit);

    if cli.dry_run {
        handle_dry_run(&config, &languages, cli.stage, limit);
        return Ok(());
    }

    let fetcher = build_fetcher(&config, cli.no_cache)?;

    let mut reports = Vec::new();
    for language in languages {
        info!("Processing {}", language.profile().channel_title);

        if cli.stage.crawls() {
            let report = handle_crawl(&config, &config_hash, language, fetcher.clone(), limit).await?;
            if !cli.quiet {
                print_statistics(&report);
                println!();
            }
            reports.push(report);
        }

        if cli.stage.downloads() {
            handle_download(&config, language, fetcher.clone()).await?;
        }
    }

    if !reports.is_empty() {
        let report_path = Path::new(&config.output.report_path);
        write_markdown_report(&reports, report_path)
            .with_context(|| format!("Failed to write report to {}", report_path.display()))?;
        info!("Crawl report written to {}", report_path.display());
    }

    Ok(())
}

/// Sets up logging based on verbosity flags
///
/// # Arguments
///
/// * `verbose` - Verbosity level (0-3+)
/// * `quiet` - If true, only show errors
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("tessa_harvest=info,warn"),
            1 => EnvFilter::new("tessa_harvest=debug,info"),
            2 => EnvFilter::new("tessa_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Builds the shared fetcher, backed by the response cache unless disabled
fn build_fetcher(config: &Config, no_cache: bool) -> anyhow::Result<Arc<dyn Fetcher>> {
    let client = build_http_client(&config.user_agent, config.crawler.request_timeout)
        .context("Failed to build HTTP client")?;
    let mut fetcher = HttpFetcher::new(client);

    if config.cache.enabled && !no_cache {
        let path = Path::new(&config.cache.database_path);
        let cache = ResponseCache::open(path, &config.cache)
            .with_context(|| format!("Failed to open response cache {}", path.display()))?;
        info!("Using response cache at {}", path.display());
        fetcher = fetcher.with_cache(cache);
    } else {
        info!("Response cache disabled");
    }

    Ok(Arc::new(fetcher))
}

/// Handles the --dry-run mode: validates config and shows what would be processed
fn handle_dry_run(config: &Config, languages: &[Language], stage: Stage, limit: usize) {
    println!("=== TESSA Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Page limit: {}", limit);
    println!("  Request timeout: {}s", config.crawler.request_timeout);
    println!("  Unknown kinds: {:?}", config.crawler.unknown_kinds);
    println!("  Stage: {:?}", stage);
    println!();

    println!("User Agent:");
    println!(
        "  {}/{} (+{}; {})",
        config.user_agent.crawler_name,
        config.user_agent.crawler_version,
        config.user_agent.contact_url,
        config.user_agent.contact_email
    );
    println!();

    println!("Output:");
    println!("  Trees: {}", config.output.trees_dir);
    println!("  Downloads: {}", config.output.downloads_dir);
    println!("  Report: {}", config.output.report_path);
    println!();

    println!("Cache:");
    if config.cache.enabled {
        println!("  Database: {}", config.cache.database_path);
        println!("  Max age: {}s", config.cache.max_age);
        println!("  Never expire: {}", config.cache.forever_domains.join(", "));
    } else {
        println!("  disabled");
    }
    println!();

    println!("Source domains ({}):", config.site.source_domains.len());
    for domain in &config.site.source_domains {
        println!("  - {}", domain);
    }
    println!();

    println!("Languages ({}):", languages.len());
    for language in languages {
        println!(
            "  - {} [{}]: {}",
            language.profile().channel_title,
            language.profile().channel_source_id,
            config.entry_url(*language)
        );
    }
    println!();

    println!("✓ Configuration is valid");
}

/// Runs the crawl stage of one language and writes both trees
async fn handle_crawl(
    config: &Config,
    config_hash: &str,
    language: Language,
    fetcher: Arc<dyn Fetcher>,
    limit: usize,
) -> anyhow::Result<LanguageReport> {
    let started_at = Utc::now();
    let trees_dir = Path::new(&config.output.trees_dir);

    let outcome = crawl_language(config, language, fetcher, limit)
        .await
        .with_context(|| format!("Crawl of {} failed", language))?;
    if outcome.stats.limit_reached {
        warn!("{} tree is partial: page limit of {} reached", language, limit);
    }

    let raw_path = write_raw_tree(trees_dir, language, &outcome.tree)
        .with_context(|| format!("Failed to write raw tree for {}", language))?;
    info!("Raw tree written to {}", raw_path.display());

    let mut tree = outcome.tree;
    let raw_nodes = tree.len();
    let restructured = normalize_tree(&mut tree, language);
    let canonical = to_canonical(&tree, config.crawler.unknown_kinds)
        .with_context(|| format!("Failed to build canonical tree for {}", language))?;

    let canonical_path = write_canonical_tree(trees_dir, language, &canonical)
        .with_context(|| format!("Failed to write canonical tree for {}", language))?;
    info!("Canonical tree written to {}", canonical_path.display());

    Ok(LanguageReport::new(
        language,
        started_at,
        config_hash,
        raw_nodes,
        &canonical,
        restructured,
        outcome.stats,
    ))
}

/// Runs the download stage of one language from its canonical tree
async fn handle_download(config: &Config, language: Language, fetcher: Arc<dyn Fetcher>) -> anyhow::Result<()> {
    let trees_dir = Path::new(&config.output.trees_dir);
    let downloads_dir = Path::new(&config.output.downloads_dir);

    let canonical = read_canonical_tree(trees_dir, language)
        .with_context(|| format!("No canonical tree for {}; run the crawl stage first", language))?;

    let downloader = Downloader::new(fetcher, downloads_dir);
    let packaged = downloader.materialize_tree(&canonical).await;

    let manifest = write_manifest(downloads_dir, language, &packaged)
        .with_context(|| format!("Failed to write package manifest for {}", language))?;
    info!(
        "Packaged {} items for {}; manifest at {}",
        packaged.len(),
        language,
        manifest.display()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_languages() {
        assert_eq!(parse_languages("all").unwrap().0, Language::ALL.to_vec());
        assert_eq!(parse_languages("SW").unwrap().0, vec![Language::Sw]);
        assert!(parse_languages("de").is_err());
    }

    #[test]
    fn test_stage_selection() {
        assert!(Stage::All.crawls() && Stage::All.downloads());
        assert!(Stage::Crawl.crawls() && !Stage::Crawl.downloads());
        assert!(!Stage::Download.crawls() && Stage::Download.downloads());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::parse_from(["tessa-harvest", "config.toml", "--lang", "fr", "--limit", "5", "--no-cache"]);
        assert_eq!(cli.lang.0, vec![Language::Fr]);
        assert_eq!(cli.limit, Some(5));
        assert!(cli.no_cache);
        assert_eq!(cli.stage, Stage::All);
    }
}
