use anyhow::{Context, Result};
use glob::Pattern;
use std::fs;
use std::path::Path;

use crate::utils::file::is_path_excluded;

/// Number of files, directories and excluded entries of a tree.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TreeCount {
    pub files: usize,
    pub directories: usize,
    pub excluded: usize,
}

/// Count the entries under `path` that a scan with the same depth and
/// excludes would visit.
pub fn count<P: AsRef<Path>>(path: P, max_depth: usize, exclude_patterns: &[Pattern]) -> Result<TreeCount> {
    let path = path.as_ref();
    if is_path_excluded(path, exclude_patterns) {
        return Ok(TreeCount {
            excluded: 1,
            ..TreeCount::default()
        });
    }

    let mut total = TreeCount {
        directories: 1,
        ..TreeCount::default()
    };
    let entries = fs::read_dir(path).with_context(|| format!("Failed to read directory {}", path.display()))?;
    for entry in entries {
        let entry_path = entry?.path();
        if is_path_excluded(&entry_path, exclude_patterns) {
            total.excluded += 1;
        } else if entry_path.is_file() {
            total.files += 1;
        } else if entry_path.is_dir() {
            if max_depth > 0 {
                let sub = count(&entry_path, max_depth - 1, exclude_patterns)?;
                total.files += sub.files;
                total.directories += sub.directories;
                total.excluded += sub.excluded;
            } else {
                total.directories += 1;
            }
        }
    }
    Ok(total)
}
