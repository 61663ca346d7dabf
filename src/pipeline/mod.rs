//! Batch stages: filter the raw exports, reformat them, merge pages.
//!
//! Each stage walks a directory tree, handles files one at a time, and logs
//! and skips any file that fails rather than aborting the run.

pub mod filter;
pub mod merge;
pub mod process;
pub mod utility;

use anyhow::Result;
use tracing::info;

use crate::config::AppPaths;
use crate::pipeline::process::{ProcessSummary, Processor};

/// Outcome of [`run_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub copied: usize,
    pub process: ProcessSummary,
    pub merged: usize,
}

/// Runs filter → process → merge over the standard layout.
#[tracing::instrument(skip_all)]
pub fn run_all(
    paths: &AppPaths,
    pattern: &regex::Regex,
    processor: &mut Processor,
    jgroupid: &str,
) -> Result<RunSummary> {
    let copied = filter::filter_and_copy(&paths.raw_input, &paths.filtered, pattern)?;
    let process = processor.process_tree(&paths.filtered, &paths.processed)?;
    let merged = merge::merge_tree(&paths.processed, &paths.merged, jgroupid)?;

    info!(copied, processed = process.processed, merged, "Pipeline complete");
    Ok(RunSummary {
        copied,
        process,
        merged,
    })
}
