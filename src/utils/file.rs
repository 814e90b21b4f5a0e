use chrono::{DateTime, Utc};
use glob::Pattern;
use log::warn;
use std::fs;
use std::path::Path;

/// Modification date of a file or directory as an RFC3339 string.
pub fn get_modification_date(metadata: &fs::Metadata) -> Option<String> {
    metadata
        .modified()
        .ok()
        .map(|time| DateTime::<Utc>::from(time).to_rfc3339())
}

/// Compile exclude globs, skipping and logging invalid ones.
pub fn compile_exclude_patterns(patterns: &[String]) -> Vec<Pattern> {
    patterns
        .iter()
        .filter(|pattern| !pattern.trim().is_empty())
        .filter_map(|pattern| match Pattern::new(pattern.trim()) {
            Ok(compiled) => Some(compiled),
            Err(e) => {
                warn!("Ignoring invalid exclude pattern {pattern:?}: {e}");
                None
            }
        })
        .collect()
}

/// True if `path` or its file name matches one of `exclude_patterns`.
pub fn is_path_excluded(path: &Path, exclude_patterns: &[Pattern]) -> bool {
    let path_str = path.to_string_lossy();
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();

    exclude_patterns
        .iter()
        .any(|pattern| pattern.matches(&path_str) || pattern.matches(&file_name))
}
