//! Directory layout of an application root and how it is resolved.

use std::path::{Path, PathBuf};

/// Environment variable naming the application root.
pub const ROOT_ENV: &str = "CSVREAD_ROOT";
/// Environment variable naming the raw OCR export directory.
pub const INPUT_ENV: &str = "CSVREAD_INPUT";

/// Directory layout under the application root.
///
/// ```text
/// <root>/input               raw OCR exports (or $CSVREAD_INPUT)
/// <root>/filtered_originals  files selected by `filter`
/// <root>/processed_output    per-file load files
/// <root>/merged_output       per-document merged load files
/// <root>/master_data         master.csv, jgroupid_master.csv
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub raw_input: PathBuf,
    pub filtered: PathBuf,
    pub processed: PathBuf,
    pub merged: PathBuf,
    pub master_data: PathBuf,
}

impl AppPaths {
    pub fn under(root: &Path) -> Self {
        Self {
            raw_input: root.join("input"),
            filtered: root.join("filtered_originals"),
            processed: root.join("processed_output"),
            merged: root.join("merged_output"),
            master_data: root.join("master_data"),
        }
    }

    /// Resolves the layout from `root` (or `$CSVREAD_ROOT`, or the working
    /// directory), honoring `$CSVREAD_INPUT` for the raw exports.
    pub fn from_env(root: Option<PathBuf>) -> Self {
        let root = root
            .or_else(|| std::env::var_os(ROOT_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."));

        let mut paths = Self::under(&root);
        if let Some(input) = std::env::var_os(INPUT_ENV) {
            paths.raw_input = PathBuf::from(input);
        }
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_under_root() {
        let paths = AppPaths::under(Path::new("/data/csvRead"));
        assert_eq!(paths.filtered, Path::new("/data/csvRead/filtered_originals"));
        assert_eq!(paths.processed, Path::new("/data/csvRead/processed_output"));
        assert_eq!(paths.merged, Path::new("/data/csvRead/merged_output"));
        assert_eq!(paths.master_data, Path::new("/data/csvRead/master_data"));
    }

    #[test]
    fn test_explicit_root_wins() {
        let paths = AppPaths::from_env(Some(PathBuf::from("/tmp/explicit")));
        assert_eq!(paths.merged, Path::new("/tmp/explicit/merged_output"));
    }
}
