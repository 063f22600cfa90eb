//! Export file discovery

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default file name endings of station exports
pub const DEFAULT_EXTENSIONS: &[&str] = &[".txt", ".csv"];

/// Files directly inside `dir` whose name ends with one of `extensions`,
/// sorted by name.
///
/// A missing or unreadable directory is treated as "no data yet" and
/// yields an empty list.
pub fn discover_files<S: AsRef<str>>(dir: &Path, extensions: &[S]) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            info!(dir = %dir.display(), error = %e, "Source directory not readable, no files");
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.path()),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Skipping unreadable entry");
                None
            }
        })
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|name| matches_extension(name, extensions))
                .unwrap_or(false)
        })
        .collect();

    files.sort();
    files
}

pub fn matches_extension<S: AsRef<str>>(name: &str, extensions: &[S]) -> bool {
    extensions.iter().any(|ext| name.ends_with(ext.as_ref()))
}
