//! Combines processed page files into one headerless load file per document.
//!
//! Page files are named `B000001_<page>.jpg_020_processed.csv`; every page of
//! `B000001` ends up in `B000001_merged.csv` in page order, with ids
//! renumbered across the whole document.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{error, info, warn};

use crate::output::{read_records, write_records};
use crate::pipeline::process::PROCESSED_SUFFIX;
use crate::pipeline::utility::{collect_files, ends_with_ignore_case};
use crate::schema::LoadRecord;

/// jgroupid forced onto every row of a merged document.
pub const DEFAULT_GROUP_JGROUPID: &str = "001";

static PAGE_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(B\d{6})_(\d+)\.jpg_020_processed\.csv$").expect("static regex")
});

/// One processed page belonging to a document group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFile {
    pub page: u64,
    pub path: PathBuf,
}

/// Splits a page file name into its group root and page number.
pub fn parse_page_name(name: &str) -> Option<(String, u64)> {
    let caps = PAGE_FILE.captures(name)?;
    let page = caps[2].parse().ok()?;
    Some((caps[1].to_string(), page))
}

/// Collects processed page files under `root`, grouped by document and
/// sorted by page number. Names that do not fit the page pattern are logged
/// and left out.
pub fn collect_groups(root: &Path) -> Result<BTreeMap<String, Vec<PageFile>>> {
    let files = collect_files(root, |name| ends_with_ignore_case(name, PROCESSED_SUFFIX))?;

    let mut groups: BTreeMap<String, Vec<PageFile>> = BTreeMap::new();
    for path in files {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        match parse_page_name(name) {
            Some((group, page)) => groups.entry(group).or_default().push(PageFile { page, path }),
            None => info!(file = name, "Not a page file, left out of merge"),
        }
    }

    for pages in groups.values_mut() {
        pages.sort_by_key(|p| p.page);
    }
    Ok(groups)
}

/// Concatenates the pages of one group into load rows.
///
/// The first row of the first non-empty page fixes `ocr_result_id` and
/// `cif_number` for the group; `jgroupid_string` is forced to `jgroupid`.
/// Unreadable or empty pages after the first are skipped.
///
/// # Errors
///
/// Returns an error if the first page cannot be read.
#[tracing::instrument(skip_all, fields(group = %group, pages = pages.len()))]
pub fn merge_group(group: &str, pages: &[PageFile], jgroupid: &str) -> Result<Vec<LoadRecord>> {
    let Some(first) = pages.first() else {
        return Ok(Vec::new());
    };

    let mut first_rows = Some(
        read_records(&first.path).with_context(|| format!("reading first page of {group}"))?,
    );
    let mut expected: Option<(String, String)> = None;

    let mut merged = Vec::new();
    let mut next_id = 1u64;

    for page in pages {
        let file = page.path.display();
        let mut rows = match first_rows.take() {
            Some(rows) => rows,
            None => match read_records(&page.path) {
                Ok(rows) => rows,
                Err(e) => {
                    error!(page = page.page, %file, error = %format!("{e:#}"), "Failed to read page, skipping");
                    continue;
                }
            },
        };

        let Some(head) = rows.first() else {
            info!(page = page.page, %file, "Empty page, skipping");
            continue;
        };

        let (ocr, cif) = expected
            .get_or_insert_with(|| (head.ocr_result_id.clone(), head.cif_number.clone()))
            .clone();
        if head.ocr_result_id != ocr {
            warn!(page = page.page, found = %head.ocr_result_id, expected = %ocr, "ocr_result_id mismatch, overwriting");
        }
        if head.cif_number != cif {
            warn!(page = page.page, found = %head.cif_number, expected = %cif, "cif_number mismatch, overwriting");
        }
        if head.jgroupid_string != jgroupid {
            warn!(page = page.page, found = %head.jgroupid_string, expected = jgroupid, "jgroupid_string mismatch, overwriting");
        }

        for row in &mut rows {
            row.ocr_result_id.clone_from(&ocr);
            row.cif_number.clone_from(&cif);
            row.jgroupid_string = jgroupid.to_string();
            row.page_no = "1".to_string();
            row.id = next_id.to_string();
            next_id += 1;
        }

        info!(page = page.page, rows = rows.len(), "Page merged");
        merged.extend(rows);
    }

    Ok(merged)
}

/// Merges every document group under `input` into `output`.
///
/// Returns the number of merged files written.
#[tracing::instrument(skip_all, fields(input = %input.display(), output = %output.display()))]
pub fn merge_tree(input: &Path, output: &Path, jgroupid: &str) -> Result<usize> {
    std::fs::create_dir_all(output).with_context(|| format!("creating {}", output.display()))?;

    let groups = collect_groups(input)?;
    info!(groups = groups.len(), "Document groups found");

    let mut written = 0;
    for (group, pages) in &groups {
        let rows = match merge_group(group, pages, jgroupid) {
            Ok(rows) => rows,
            Err(e) => {
                error!(group = %group, error = %format!("{e:#}"), "Skipping group");
                continue;
            }
        };

        let legacy = output.join(format!("{group}_processed_merged.csv"));
        if legacy.exists() {
            match std::fs::remove_file(&legacy) {
                Ok(()) => info!(file = %legacy.display(), "Removed legacy merged file"),
                Err(e) => error!(file = %legacy.display(), error = %e, "Failed to remove legacy merged file"),
            }
        }

        if rows.is_empty() {
            warn!(group = %group, "No rows to merge, nothing written");
            continue;
        }

        let target = output.join(format!("{group}_merged.csv"));
        match write_records(&target, &rows, false) {
            Ok(()) => {
                info!(group = %group, rows = rows.len(), file = %target.display(), "Merged file written");
                written += 1;
            }
            Err(e) => error!(group = %group, error = %format!("{e:#}"), "Failed to write merged file"),
        }
    }

    info!(written, "Merge complete");
    Ok(written)
}
