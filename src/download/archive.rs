//! Deterministic zip archives of packaged directories
//!
//! Entries are written in sorted path order with a fixed timestamp and fixed
//! permissions, so the same directory contents always produce the same bytes.

use crate::Result;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

const FILE_MODE: u32 = 0o644;

/// Lists the files below `dir` as `/`-separated relative paths, sorted
pub fn list_files(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
                continue;
            }
            let relative = path
                .strip_prefix(dir)
                .map_err(|e| crate::HarvestError::InvariantViolation(e.to_string()))?
                .components()
                .map(|part| part.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            files.push((relative, path));
        }
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

/// Zips every file below `dir` into `archive_path`
///
/// # Arguments
///
/// * `dir` - Packaged directory
/// * `archive_path` - Archive to create or overwrite
///
/// # Returns
///
/// * `Ok(usize)` - Number of entries written
/// * `Err(HarvestError)` - Reading the directory or writing the archive failed
pub fn write_archive(dir: &Path, archive_path: &Path) -> Result<usize> {
    let files = list_files(dir)?;

    if let Some(parent) = archive_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = ZipWriter::new(File::create(archive_path)?);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(FILE_MODE);

    for (name, path) in &files {
        writer.start_file(name.as_str(), options)?;
        writer.write_all(&std::fs::read(path)?)?;
    }
    writer.finish()?;

    tracing::debug!("Wrote {} entries to {}", files.len(), archive_path.display());
    Ok(files.len())
}
