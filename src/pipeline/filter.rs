//! Selects the OCR exports worth processing and copies them aside.

use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};
use std::fs;
use std::path::Path;
use tracing::{error, info};

use crate::pipeline::utility::{collect_files, relative_to};

/// Page exports of the `B` document series, table number 020.
pub const DEFAULT_PATTERN: &str = r"^B.*020\.csv$";

pub fn build_pattern(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .with_context(|| format!("invalid file name pattern {pattern:?}"))
}

/// Copies every file under `input` whose name matches `pattern` into
/// `output`, keeping the relative directory layout and modification time.
///
/// Returns the number of files copied. A failed copy is logged and skipped.
#[tracing::instrument(skip_all, fields(input = %input.display(), output = %output.display()))]
pub fn filter_and_copy(input: &Path, output: &Path, pattern: &Regex) -> Result<usize> {
    fs::create_dir_all(output).with_context(|| format!("creating {}", output.display()))?;

    let matches = collect_files(input, |name| pattern.is_match(name))?;
    info!(matches = matches.len(), "Matching files found");

    let mut copied = 0;
    for source in &matches {
        let target = output.join(relative_to(source, input));

        match copy_preserving_mtime(source, &target) {
            Ok(()) => {
                info!(from = %source.display(), to = %target.display(), "Copied");
                copied += 1;
            }
            Err(e) => error!(file = %source.display(), error = %e, "Copy failed"),
        }
    }

    info!(copied, "Filter complete");
    Ok(copied)
}

fn copy_preserving_mtime(source: &Path, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(source, target)?;

    let modified = fs::metadata(source)?.modified()?;
    fs::File::options()
        .write(true)
        .open(target)?
        .set_modified(modified)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_is_case_insensitive() {
        let re = build_pattern(DEFAULT_PATTERN).unwrap();
        assert!(re.is_match("B000001_1.jpg_020.csv"));
        assert!(re.is_match("b000001_1.JPG_020.CSV"));
        assert!(!re.is_match("B000001_1.jpg_010.csv"));
        assert!(!re.is_match("A000001_1.jpg_020.csv"));
        assert!(!re.is_match("B000001_1.jpg_020.csv.bak"));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(build_pattern("([").is_err());
    }

    #[test]
    fn test_filter_copies_matching_files_with_layout() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        fs::create_dir_all(src.path().join("唐木")).unwrap();
        fs::write(src.path().join("唐木/B000002_1.jpg_020.csv"), "x").unwrap();
        fs::write(src.path().join("唐木/B000002_1.jpg_030.csv"), "y").unwrap();
        fs::write(src.path().join("B000003_2.jpg_020.csv"), "z").unwrap();

        let re = build_pattern(DEFAULT_PATTERN).unwrap();
        let copied = filter_and_copy(src.path(), dst.path(), &re).unwrap();

        assert_eq!(copied, 2);
        assert_eq!(
            fs::read_to_string(dst.path().join("唐木/B000002_1.jpg_020.csv")).unwrap(),
            "x"
        );
        assert!(dst.path().join("B000003_2.jpg_020.csv").exists());
        assert!(!dst.path().join("唐木/B000002_1.jpg_030.csv").exists());

        let src_mtime = fs::metadata(src.path().join("B000003_2.jpg_020.csv"))
            .unwrap()
            .modified()
            .unwrap();
        let dst_mtime = fs::metadata(dst.path().join("B000003_2.jpg_020.csv"))
            .unwrap()
            .modified()
            .unwrap();
        assert_eq!(src_mtime, dst_mtime);
    }
}
