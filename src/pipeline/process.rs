//! Reformats source CSVs into per-file load files.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::ids::IdGenerator;
use crate::mapping::MappingSet;
use crate::master::MasterData;
use crate::parser::{SourceTable, parse_source};
use crate::pipeline::utility::{collect_files, ends_with_ignore_case, relative_to};
use crate::schema::LoadRecord;

pub const PROCESSED_SUFFIX: &str = "_processed.csv";

/// Counts from one [`Processor::process_tree`] run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessSummary {
    pub processed: usize,
    pub skipped: usize,
    pub rows: usize,
}

/// Whether `name` is a source CSV rather than an earlier output.
pub fn is_source_csv(name: &str) -> bool {
    ends_with_ignore_case(name, ".csv") && !ends_with_ignore_case(name, PROCESSED_SUFFIX)
}

/// `B000001_1.jpg_020.csv` → `B000001_1.jpg_020_processed.csv`.
pub fn processed_file_name(name: &str) -> String {
    let stem = if ends_with_ignore_case(name, ".csv") {
        &name[..name.len() - 4]
    } else {
        name
    };
    format!("{stem}{PROCESSED_SUFFIX}")
}

/// Holds the mappings, masters and id counters for one run.
pub struct Processor {
    mappings: MappingSet,
    master: MasterData,
    ids: IdGenerator,
}

impl Processor {
    pub fn new(mappings: MappingSet, master: MasterData, ids: IdGenerator) -> Self {
        Self {
            mappings,
            master,
            ids,
        }
    }

    /// Converts a parsed source table into load rows.
    ///
    /// Draws one set of file identifiers, so every call advances the OCR
    /// sequence.
    pub fn build_records(&mut self, table: &SourceTable, now: NaiveDateTime) -> Vec<LoadRecord> {
        let mapping = self.mappings.for_kind(table.kind).resolve(table);
        for field in mapping.missing() {
            debug!(?field, kind = %table.kind, "Mapped column absent, leaving empty");
        }

        let file = self.ids.next_file(now, self.master.jgroupids());

        table
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let mut record = LoadRecord {
                    ocr_result_id: file.ocr_result_id.clone(),
                    page_no: "1".to_string(),
                    id: (i + 1).to_string(),
                    jgroupid_string: file.jgroupid_string.clone(),
                    cif_number: file.cif_number.clone(),
                    settlement_at: file.settlement_at.clone(),
                    ..Default::default()
                };
                mapping.apply(row, &mut record);
                record.maker_com_code = self.ids.maker_com_code(&record.maker_name, &self.master);
                record.fill_derived();
                record
            })
            .collect()
    }

    /// Processes one source file and writes its load file under `output_root`,
    /// mirroring the file's directory relative to `input_root`.
    ///
    /// Returns the written path and row count.
    #[tracing::instrument(skip_all, fields(file = %path.display()))]
    pub fn process_file(
        &mut self,
        path: &Path,
        input_root: &Path,
        output_root: &Path,
        now: NaiveDateTime,
    ) -> Result<(PathBuf, usize)> {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let table = parse_source(&bytes)?;
        info!(
            kind = %table.kind,
            encoding = table.encoding,
            rows = table.rows.len(),
            "Source parsed"
        );

        let records = self.build_records(&table, now);

        let relative = relative_to(path, input_root);
        let file_name = relative
            .file_name()
            .and_then(|n| n.to_str())
            .context("source path has no file name")?;
        let target = output_root
            .join(relative.parent().unwrap_or(Path::new("")))
            .join(processed_file_name(file_name));

        crate::output::write_records(&target, &records, true)?;
        Ok((target, records.len()))
    }

    /// Processes every source CSV under `input`. Files that fail are logged
    /// and counted as skipped.
    #[tracing::instrument(skip_all, fields(input = %input.display(), output = %output.display()))]
    pub fn process_tree(&mut self, input: &Path, output: &Path) -> Result<ProcessSummary> {
        std::fs::create_dir_all(output)
            .with_context(|| format!("creating {}", output.display()))?;

        let files = collect_files(input, is_source_csv)?;
        info!(files = files.len(), "Source files found");

        let mut summary = ProcessSummary::default();
        for path in &files {
            match self.process_file(path, input, output, Local::now().naive_local()) {
                Ok((target, rows)) => {
                    info!(from = %path.display(), to = %target.display(), rows, "Processed");
                    summary.processed += 1;
                    summary.rows += rows;
                }
                Err(e) => {
                    error!(file = %path.display(), error = %format!("{e:#}"), "Skipping file");
                    summary.skipped += 1;
                }
            }
        }

        if summary.skipped > 0 {
            warn!(skipped = summary.skipped, "Some files were skipped");
        }
        info!(
            processed = summary.processed,
            rows = summary.rows,
            "Processing complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::MakerCodeStrategy;
    use crate::mapping::FileKind;
    use chrono::NaiveDate;
    use std::fs;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 31)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn processor(strategy: MakerCodeStrategy) -> Processor {
        Processor::new(
            MappingSet::default(),
            MasterData::with_defaults(),
            IdGenerator::seeded(strategy, 11),
        )
    }

    #[test]
    fn test_processed_file_name() {
        assert_eq!(
            processed_file_name("B000001_1.jpg_020.csv"),
            "B000001_1.jpg_020_processed.csv"
        );
        assert_eq!(processed_file_name("X.CSV"), "X_processed.csv");
    }

    #[test]
    fn test_is_source_csv() {
        assert!(is_source_csv("B000001_1.jpg_020.csv"));
        assert!(!is_source_csv("B000001_1.jpg_020_processed.csv"));
        assert!(!is_source_csv("readme.md"));
    }

    #[test]
    fn test_build_records_hand_bill() {
        let src = "振出人,振出年月日,支払期日,支払銀行名称,支払銀行支店名,金額,割引銀行名及び支店名等,摘要\n\
                   (株)新寿堂,R5.4.1,R5.7.31,みずほ,本店,\"1,200,000\",三井住友 新宿,\n\
                   (株)太平印刷社,R5.4.5,,りそな,,300000,,裏書\n";
        let table = parse_source(src.as_bytes()).unwrap();
        assert_eq!(table.kind, FileKind::HandBill);

        let mut p = processor(MakerCodeStrategy::Sequential);
        let records = p.build_records(&table, now());

        assert_eq!(records.len(), 2);
        let r = &records[0];
        assert_eq!(r.ocr_result_id, "202501310930000001");
        assert_eq!(r.page_no, "1");
        assert_eq!(r.id, "1");
        assert_eq!(r.settlement_at, "202501");
        assert_eq!(r.maker_name, "(株)新寿堂");
        assert_eq!(r.maker_name_original, "(株)新寿堂");
        assert_eq!(r.maker_com_code, "001");
        assert_eq!(r.issue_date, "R5.4.1");
        assert_eq!(r.issue_date_rightside_date, "R5.4.1");
        assert_eq!(r.balance, "1,200,000");
        assert_eq!(r.balance_rightside, "1,200,000");
        assert_eq!(r.payment_bank_branch_name_rightside, "本店");
        assert_eq!(r.description_rightside, "三井住友 新宿");
        assert_eq!(r.description, "");

        let r2 = &records[1];
        assert_eq!(r2.id, "2");
        assert_eq!(r2.maker_com_code, "002");
        assert_eq!(r2.due_date, "");
        assert_eq!(r2.description, "裏書");
        assert_eq!(r2.ocr_result_id, r.ocr_result_id);
        assert_eq!(r2.cif_number, r.cif_number);
        assert_eq!(r2.jgroupid_string, r.jgroupid_string);
    }

    #[test]
    fn test_build_records_financial_statement() {
        let src = "account,amount_0,amount_1,amount_2\n受取手形,100,200,300\n";
        let table = parse_source(src.as_bytes()).unwrap();

        let mut p = processor(MakerCodeStrategy::Sequential);
        let r = &p.build_records(&table, now())[0];

        assert_eq!(r.maker_name, "受取手形");
        assert_eq!(r.issue_date, "100");
        assert_eq!(r.balance, "100");
        assert_eq!(r.due_date, "200");
        assert_eq!(r.description, "300");
        assert_eq!(r.payment_bank_name, "");
    }

    #[test]
    fn test_build_records_master_lookup() {
        let src = "(株)シーフォース,R6.1.1\n無名商店,R6.2.1\n";
        let table = parse_source(src.as_bytes()).unwrap();

        let mut p = processor(MakerCodeStrategy::Master);
        let records = p.build_records(&table, now());

        assert_eq!(records[0].maker_com_code, "7398659210");
        assert_eq!(records[1].maker_com_code, "");
    }

    #[test]
    fn test_maker_codes_shared_across_files() {
        let mut p = processor(MakerCodeStrategy::Sequential);
        let a = parse_source("A社\nB社\n".as_bytes()).unwrap();
        let b = parse_source("B社\nC社\n".as_bytes()).unwrap();

        let first = p.build_records(&a, now());
        let second = p.build_records(&b, now());

        assert_eq!(second[0].maker_com_code, first[1].maker_com_code);
        assert_eq!(second[1].maker_com_code, "003");
        assert_eq!(second[0].ocr_result_id, "202501310930000002");
    }

    #[test]
    fn test_process_tree_skips_bad_files_without_consuming_sequence() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        fs::create_dir_all(input.path().join("中島")).unwrap();
        fs::write(input.path().join("中島/B000001_1.jpg_020.csv"), "A社,R5.1.1\n").unwrap();
        fs::write(input.path().join("a_empty.csv"), "account,amount_0\n").unwrap();
        fs::write(input.path().join("old_processed.csv"), "ignored").unwrap();

        let mut p = processor(MakerCodeStrategy::Sequential);
        let summary = p.process_tree(input.path(), output.path()).unwrap();

        assert_eq!(
            summary,
            ProcessSummary {
                processed: 1,
                skipped: 1,
                rows: 1
            }
        );

        let out = output.path().join("中島/B000001_1.jpg_020_processed.csv");
        let rows = crate::output::read_records(&out).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].ocr_result_id.ends_with("0001"));
        assert!(!output.path().join("old_processed_processed.csv").exists());
    }
}
