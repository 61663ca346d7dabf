//! Reading and writing load files.
//!
//! Load files are UTF-8 with a BOM so spreadsheet tools on the loading side
//! pick up the encoding.

use anyhow::{Context, Result};
use csv::WriterBuilder;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

use crate::parser::decode;
use crate::schema::LoadRecord;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Writes `records` to `path`, replacing any existing file.
///
/// Parent directories are created as needed.
pub fn write_records(path: &Path, records: &[LoadRecord], with_header: bool) -> Result<()> {
    debug!(path = %path.display(), rows = records.len(), with_header, "Writing load file");

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);
    out.write_all(UTF8_BOM)?;

    let mut writer = WriterBuilder::new()
        .has_headers(with_header)
        .from_writer(out);

    // An empty slice would otherwise skip the header row entirely.
    if records.is_empty() && with_header {
        writer.write_record(crate::schema::TARGET_COLUMNS)?;
    }
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    Ok(())
}

/// Reads a load file that has a header row, matching columns by name.
pub fn read_records(path: &Path) -> Result<Vec<LoadRecord>> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let (text, _) = decode(&bytes)?;

    let mut rdr = csv::Reader::from_reader(text.as_bytes());
    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let record: LoadRecord = result?;
        rows.push(record);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TARGET_COLUMNS;
    use std::fs;

    fn sample(id: &str) -> LoadRecord {
        LoadRecord {
            ocr_result_id: "202401010000000001".into(),
            page_no: "1".into(),
            id: id.into(),
            maker_name: "(株)新寿堂".into(),
            balance: "1,000".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_write_with_header_starts_with_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.csv");

        write_records(&path, &[sample("1"), sample("2")], true).unwrap();

        let bytes = fs::read(&path).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], TARGET_COLUMNS.join(","));
    }

    #[test]
    fn test_write_without_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merged.csv");

        write_records(&path, &[sample("1")], false).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let text = text.trim_start_matches('\u{feff}');
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("202401010000000001,1,1,"));
    }

    #[test]
    fn test_write_empty_keeps_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");

        write_records(&path, &[], true).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.trim_start_matches('\u{feff}').lines().count(), 1);
    }

    #[test]
    fn test_read_back_written_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.csv");
        let records = vec![sample("1"), sample("2")];

        write_records(&path, &records, true).unwrap();
        assert_eq!(read_records(&path).unwrap(), records);
    }

    #[test]
    fn test_read_tolerates_missing_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.csv");
        fs::write(&path, "id,maker_name,extra\n4,A社,x\n").unwrap();

        let rows = read_records(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "4");
        assert_eq!(rows[0].maker_name, "A社");
        assert_eq!(rows[0].cif_number, "");
    }
}
