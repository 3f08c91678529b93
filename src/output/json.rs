//! Per-language JSON artifacts
//!
//! The crawl and download stages communicate through these files, so either
//! stage can be rerun or inspected on its own.

use crate::download::PackagedContent;
use crate::site::Language;
use crate::tree::{CanonicalNode, CrawlNode};
use crate::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// `{trees-dir}/raw_tree_{lang}.json`
pub fn raw_tree_path(trees_dir: &Path, language: Language) -> PathBuf {
    trees_dir.join(format!("raw_tree_{}.json", language.code()))
}

/// `{trees-dir}/web_resource_tree_{lang}.json`
pub fn canonical_tree_path(trees_dir: &Path, language: Language) -> PathBuf {
    trees_dir.join(format!("web_resource_tree_{}.json", language.code()))
}

/// `{downloads-dir}/packages_{lang}.json`
pub fn manifest_path(downloads_dir: &Path, language: Language) -> PathBuf {
    downloads_dir.join(format!("packages_{}.json", language.code()))
}

/// Writes `value` as pretty-printed JSON, creating parent directories
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    tracing::debug!("Wrote {}", path.display());
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

pub fn write_raw_tree(trees_dir: &Path, language: Language, tree: &CrawlNode) -> Result<PathBuf> {
    let path = raw_tree_path(trees_dir, language);
    write_json(&path, tree)?;
    Ok(path)
}

pub fn read_raw_tree(trees_dir: &Path, language: Language) -> Result<CrawlNode> {
    read_json(&raw_tree_path(trees_dir, language))
}

pub fn write_canonical_tree(trees_dir: &Path, language: Language, tree: &CanonicalNode) -> Result<PathBuf> {
    let path = canonical_tree_path(trees_dir, language);
    write_json(&path, tree)?;
    Ok(path)
}

pub fn read_canonical_tree(trees_dir: &Path, language: Language) -> Result<CanonicalNode> {
    read_json(&canonical_tree_path(trees_dir, language))
}

/// Writes the metadata records of everything packaged for a language
pub fn write_manifest(downloads_dir: &Path, language: Language, packaged: &[PackagedContent]) -> Result<PathBuf> {
    let path = manifest_path(downloads_dir, language);
    write_json(&path, packaged)?;
    Ok(path)
}
