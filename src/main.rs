//! CLI entry point for the OCR CSV loader.
//!
//! Provides subcommands for selecting raw OCR exports, reformatting them
//! into the 21-column load layout, merging page files per document, and
//! running all three in sequence.

use anyhow::Result;
use clap::{Parser, Subcommand};
use ocr_csv_loader::config::AppPaths;
use ocr_csv_loader::ids::{IdGenerator, MakerCodeStrategy};
use ocr_csv_loader::mapping::MappingSet;
use ocr_csv_loader::master::MasterData;
use ocr_csv_loader::pipeline::{
    filter::{DEFAULT_PATTERN, build_pattern, filter_and_copy},
    merge::{DEFAULT_GROUP_JGROUPID, merge_tree},
    process::Processor,
    run_all,
};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "ocr_csv_loader")]
#[command(about = "Reformat OCR-extracted CSV exports into a bulk-load layout", long_about = None)]
struct Cli {
    /// Application root; defaults to $CSVREAD_ROOT or the working directory
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct ProcessArgs {
    /// Directory of master.csv and jgroupid_master.csv
    #[arg(long, value_name = "DIR")]
    master_dir: Option<PathBuf>,

    /// How maker_com_code is assigned
    #[arg(long, value_enum, default_value_t = MakerCodeStrategy::Sequential)]
    maker_code: MakerCodeStrategy,

    /// JSON file overriding the built-in column mappings
    #[arg(long, value_name = "FILE")]
    mappings: Option<PathBuf>,

    /// Seed for jgroupid/cif_number selection, for repeatable output
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy raw exports whose names match a pattern, keeping the folder layout
    Filter {
        /// Directory of raw OCR exports
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Directory to copy matches into
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// File name regex, matched case-insensitively
        #[arg(short, long, default_value = DEFAULT_PATTERN)]
        pattern: String,
    },
    /// Reformat every source CSV into a *_processed.csv load file
    Process {
        /// Directory of source CSVs
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Directory to write processed files into
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        opts: ProcessArgs,
    },
    /// Merge processed page files into one headerless file per document
    Merge {
        /// Directory of *_processed.csv files
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Directory to write merged files into
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// jgroupid_string written to every merged row
        #[arg(long, default_value = DEFAULT_GROUP_JGROUPID)]
        jgroupid: String,
    },
    /// Run filter, process and merge over the standard layout
    Run {
        /// File name regex for the filter stage
        #[arg(short, long, default_value = DEFAULT_PATTERN)]
        pattern: String,

        /// jgroupid_string written to every merged row
        #[arg(long, default_value = DEFAULT_GROUP_JGROUPID)]
        jgroupid: String,

        #[command(flatten)]
        opts: ProcessArgs,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/ocr_csv_loader.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("ocr_csv_loader.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let paths = AppPaths::from_env(cli.root);

    match cli.command {
        Commands::Filter {
            input,
            output,
            pattern,
        } => {
            let pattern = build_pattern(&pattern)?;
            filter_and_copy(
                &input.unwrap_or(paths.raw_input),
                &output.unwrap_or(paths.filtered),
                &pattern,
            )?;
        }
        Commands::Process {
            input,
            output,
            opts,
        } => {
            let mut processor = build_processor(&paths, opts)?;
            processor.process_tree(
                &input.unwrap_or(paths.filtered),
                &output.unwrap_or(paths.processed),
            )?;
        }
        Commands::Merge {
            input,
            output,
            jgroupid,
        } => {
            merge_tree(
                &input.unwrap_or(paths.processed),
                &output.unwrap_or(paths.merged),
                &jgroupid,
            )?;
        }
        Commands::Run {
            pattern,
            jgroupid,
            opts,
        } => {
            let pattern = build_pattern(&pattern)?;
            let mut processor = build_processor(&paths, opts)?;
            let summary = run_all(&paths, &pattern, &mut processor, &jgroupid)?;
            info!(?summary, "Run finished");
        }
    }

    Ok(())
}

/// Loads mappings and master data and seeds the id generator.
fn build_processor(paths: &AppPaths, opts: ProcessArgs) -> Result<Processor> {
    let mappings = match &opts.mappings {
        Some(path) => {
            info!(path = %path.display(), "Loading column mapping overrides");
            MappingSet::load(path)?
        }
        None => MappingSet::default(),
    };

    let master_dir = opts.master_dir.as_deref().unwrap_or(paths.master_data.as_path());
    let master = MasterData::load(master_dir);

    let ids = match opts.seed {
        Some(seed) => IdGenerator::seeded(opts.maker_code, seed),
        None => IdGenerator::new(opts.maker_code),
    };

    Ok(Processor::new(mappings, master, ids))
}
