//! Decoder and CSV reader for OCR export files.

use anyhow::{Result, bail};
use csv::{ReaderBuilder, StringRecord};
use encoding_rs::SHIFT_JIS;
use tracing::debug;

use crate::mapping::FileKind;

const UTF8_BOM: char = '\u{feff}';

/// A parsed source CSV, classified by its first record.
#[derive(Debug, Clone)]
pub struct SourceTable {
    pub kind: FileKind,
    pub encoding: &'static str,
    pub headers: Option<StringRecord>,
    pub rows: Vec<StringRecord>,
}

impl SourceTable {
    /// Number of addressable columns: the header width, or the widest row
    /// for headerless files.
    pub fn width(&self) -> usize {
        match &self.headers {
            Some(h) => h.len(),
            None => self.rows.iter().map(StringRecord::len).max().unwrap_or(0),
        }
    }

    pub fn header_position(&self, name: &str) -> Option<usize> {
        self.headers
            .as_ref()?
            .iter()
            .position(|h| h.trim() == name)
    }
}

/// Decodes raw file bytes, trying UTF-8 (with or without BOM) and then
/// Shift_JIS/CP932.
///
/// Returns the text and a label for the encoding that succeeded.
///
/// # Errors
///
/// Returns an error if neither encoding decodes the bytes cleanly.
pub fn decode(bytes: &[u8]) -> Result<(String, &'static str)> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok(match text.strip_prefix(UTF8_BOM) {
            Some(rest) => (rest.to_string(), "utf-8-sig"),
            None => (text.to_string(), "utf-8"),
        });
    }
    debug!("not valid utf-8, trying shift_jis");

    // encoding_rs maps Shift_JIS to the WHATWG variant, which is CP932.
    let (text, had_errors) = SHIFT_JIS.decode_without_bom_handling(bytes);
    if had_errors {
        bail!("bytes are neither utf-8 nor shift_jis");
    }
    Ok((text.into_owned(), "shift_jis"))
}

/// Decodes and parses a source CSV.
///
/// Rows may have differing lengths. For header kinds the first record is
/// taken as the header; for [`FileKind::Headerless`] every record is data.
///
/// # Errors
///
/// Returns an error if the bytes cannot be decoded, the CSV is malformed,
/// or the file holds no data rows.
pub fn parse_source(bytes: &[u8]) -> Result<SourceTable> {
    let (text, encoding) = decode(bytes)?;

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = reader
        .records()
        .collect::<Result<Vec<StringRecord>, _>>()?
        .into_iter();

    let Some(first) = records.next() else {
        bail!("file is empty");
    };

    let kind = FileKind::detect(first.iter());
    let (headers, rows): (Option<StringRecord>, Vec<StringRecord>) = if kind.has_header() {
        (Some(first), records.collect())
    } else {
        (None, std::iter::once(first).chain(records).collect())
    };

    if rows.is_empty() {
        bail!("no data rows below the {kind} header");
    }

    Ok(SourceTable {
        kind,
        encoding,
        headers,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_plain_utf8() {
        let (text, enc) = decode("振出人,金額".as_bytes()).unwrap();
        assert_eq!(text, "振出人,金額");
        assert_eq!(enc, "utf-8");
    }

    #[test]
    fn test_decode_strips_bom() {
        let bytes = "\u{feff}account,amount_0".as_bytes();
        let (text, enc) = decode(bytes).unwrap();
        assert_eq!(text, "account,amount_0");
        assert_eq!(enc, "utf-8-sig");
    }

    #[test]
    fn test_decode_shift_jis() {
        let (encoded, _, _) = SHIFT_JIS.encode("振出人,金額\n(株)新寿堂,100\n");
        let (text, enc) = decode(&encoded).unwrap();
        assert_eq!(enc, "shift_jis");
        assert!(text.starts_with("振出人,金額"));
    }

    #[test]
    fn test_decode_garbage_fails() {
        // 0xFF is never valid utf-8 and is not a Shift_JIS lead byte.
        assert!(decode(&[0xFF, 0xFE, 0xFF]).is_err());
    }

    #[test]
    fn test_parse_hand_bill_with_header() {
        let table = parse_source("振出人,振出年月日,金額\n(株)新寿堂,R5.4.1,100\n".as_bytes()).unwrap();
        assert_eq!(table.kind, FileKind::HandBill);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.header_position("金額"), Some(2));
        assert_eq!(table.width(), 3);
    }

    #[test]
    fn test_parse_headerless_keeps_first_row() {
        let table = parse_source("A社,R5.4.1\nB社,R5.5.1,R5.8.31\n".as_bytes()).unwrap();
        assert_eq!(table.kind, FileKind::Headerless);
        assert!(table.headers.is_none());
        assert_eq!(table.rows.len(), 2);
        assert_eq!(&table.rows[0][0], "A社");
        assert_eq!(table.width(), 3);
        assert_eq!(table.header_position("A社"), None);
    }

    #[test]
    fn test_parse_header_only_is_error() {
        assert!(parse_source("account,amount_0,amount_1\n".as_bytes()).is_err());
    }

    #[test]
    fn test_parse_empty_is_error() {
        assert!(parse_source(b"").is_err());
    }

    #[test]
    fn test_parse_quoted_header() {
        let table = parse_source("\"借入先名称(氏名)\",\"期末現在高\"\n\"X銀行\",\"5,000\"\n".as_bytes()).unwrap();
        assert_eq!(table.kind, FileKind::LoanDetails);
        assert_eq!(&table.rows[0][1], "5,000");
    }
}
