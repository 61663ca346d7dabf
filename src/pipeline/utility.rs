//! Path helpers shared by the pipeline stages.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// Recursively collects files under `root` whose file name satisfies `keep`.
///
/// Entries are visited in file-name order so runs are repeatable. Entries
/// that cannot be read are logged and skipped.
///
/// # Errors
///
/// Returns an error if `root` itself cannot be listed.
pub fn collect_files(root: &Path, keep: impl Fn(&str) -> bool) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(e).with_context(|| format!("listing {}", root.display()));
            }
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        match entry.file_name().to_str() {
            Some(name) if keep(name) => found.push(entry.into_path()),
            Some(_) => {}
            None => warn!(path = %entry.path().display(), "Skipping file with non-UTF-8 name"),
        }
    }

    Ok(found)
}

/// `path` relative to `root`, or just its file name if it lies elsewhere.
pub fn relative_to<'a>(path: &'a Path, root: &Path) -> &'a Path {
    path.strip_prefix(root)
        .unwrap_or_else(|_| Path::new(path.file_name().unwrap_or_default()))
}

/// Case-insensitive ASCII suffix test.
pub fn ends_with_ignore_case(name: &str, suffix: &str) -> bool {
    name.len() >= suffix.len()
        && name.is_char_boundary(name.len() - suffix.len())
        && name[name.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}
