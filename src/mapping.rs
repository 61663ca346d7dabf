//! Source file kinds and the column mappings that feed the load layout.
//!
//! Each [`FileKind`] has a [`ColumnMapping`] from target fields to either a
//! source header name or a 0-based column index. The defaults reproduce the
//! layouts seen in the OCR exports; a JSON file can replace any of them.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::parser::SourceTable;
use crate::schema::LoadRecord;

const HAND_BILL_MARKER: &str = "振出人";
const FINANCIAL_MARKER: &str = "account";
const LOAN_MARKER: &str = "借入先名称(氏名)";

/// The layout family of a source CSV, decided from its first record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// 手形情報: promissory-note listing with a header row.
    HandBill,
    /// 財務諸表: `account, amount_0, amount_1, ...` statement rows.
    FinancialStatement,
    /// 借入金明細: loan detail listing with a header row.
    LoanDetails,
    /// No recognizable header; the first record is data.
    Headerless,
}

impl FileKind {
    /// Classifies a file by the cells of its first record.
    pub fn detect<'a, I>(first_record: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let cells: Vec<&str> = first_record.into_iter().map(str::trim).collect();
        let has = |marker: &str| cells.iter().any(|c| *c == marker);
        let leading = cells.first().copied().unwrap_or("");

        if has(HAND_BILL_MARKER) && leading != FINANCIAL_MARKER && leading != LOAN_MARKER {
            FileKind::HandBill
        } else if has(FINANCIAL_MARKER) {
            FileKind::FinancialStatement
        } else if has(LOAN_MARKER) {
            FileKind::LoanDetails
        } else {
            FileKind::Headerless
        }
    }

    pub fn has_header(&self) -> bool {
        !matches!(self, FileKind::Headerless)
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileKind::HandBill => "hand_bill",
            FileKind::FinancialStatement => "financial_statement",
            FileKind::LoanDetails => "loan_details",
            FileKind::Headerless => "headerless",
        };
        f.write_str(s)
    }
}

/// Load-layout fields that are filled from source cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappedField {
    MakerName,
    IssueDate,
    DueDate,
    PaymentBankName,
    PaymentBankBranchName,
    Balance,
    DescriptionRightside,
    Description,
}

impl MappedField {
    fn slot<'a>(&self, record: &'a mut LoadRecord) -> &'a mut String {
        match self {
            MappedField::MakerName => &mut record.maker_name,
            MappedField::IssueDate => &mut record.issue_date,
            MappedField::DueDate => &mut record.due_date,
            MappedField::PaymentBankName => &mut record.payment_bank_name,
            MappedField::PaymentBankBranchName => &mut record.payment_bank_branch_name,
            MappedField::Balance => &mut record.balance,
            MappedField::DescriptionRightside => &mut record.description_rightside,
            MappedField::Description => &mut record.description,
        }
    }
}

/// Where a mapped value comes from in the source file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SourceRef {
    Index(usize),
    Header(String),
}

impl From<&str> for SourceRef {
    fn from(header: &str) -> Self {
        SourceRef::Header(header.to_string())
    }
}

impl From<usize> for SourceRef {
    fn from(index: usize) -> Self {
        SourceRef::Index(index)
    }
}

/// Target field → source reference for one [`FileKind`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ColumnMapping {
    entries: BTreeMap<MappedField, SourceRef>,
}

impl ColumnMapping {
    fn from_pairs<R: Into<SourceRef>>(pairs: impl IntoIterator<Item = (MappedField, R)>) -> Self {
        Self {
            entries: pairs.into_iter().map(|(f, r)| (f, r.into())).collect(),
        }
    }

    pub fn get(&self, field: MappedField) -> Option<&SourceRef> {
        self.entries.get(&field)
    }

    /// Resolves every entry to a column position in `table`.
    ///
    /// Unknown headers and out-of-range indexes resolve to `None`, which
    /// yields an empty value on every row.
    pub fn resolve(&self, table: &SourceTable) -> ResolvedMapping {
        let columns = self
            .entries
            .iter()
            .map(|(field, source)| {
                let position = match source {
                    SourceRef::Header(name) => table.header_position(name),
                    SourceRef::Index(i) if *i < table.width() => Some(*i),
                    SourceRef::Index(_) => None,
                };
                (*field, position)
            })
            .collect();
        ResolvedMapping { columns }
    }
}

/// A [`ColumnMapping`] bound to the column positions of one table.
#[derive(Debug, Clone)]
pub struct ResolvedMapping {
    columns: Vec<(MappedField, Option<usize>)>,
}

impl ResolvedMapping {
    /// Copies the mapped cells of `row` into `record`.
    pub fn apply(&self, row: &csv::StringRecord, record: &mut LoadRecord) {
        for (field, position) in &self.columns {
            let value = position.and_then(|i| row.get(i)).unwrap_or("");
            *field.slot(record) = value.to_string();
        }
    }

    pub fn missing(&self) -> impl Iterator<Item = MappedField> + '_ {
        self.columns
            .iter()
            .filter(|(_, p)| p.is_none())
            .map(|(f, _)| *f)
    }
}

/// The mapping for every [`FileKind`].
#[derive(Debug, Clone)]
pub struct MappingSet {
    pub hand_bill: ColumnMapping,
    pub financial_statement: ColumnMapping,
    pub loan_details: ColumnMapping,
    pub headerless: ColumnMapping,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MappingOverrides {
    hand_bill: Option<ColumnMapping>,
    financial_statement: Option<ColumnMapping>,
    loan_details: Option<ColumnMapping>,
    headerless: Option<ColumnMapping>,
}

impl Default for MappingSet {
    fn default() -> Self {
        use MappedField::*;

        Self {
            hand_bill: ColumnMapping::from_pairs([
                (MakerName, "振出人"),
                (IssueDate, "振出年月日"),
                (DueDate, "支払期日"),
                (PaymentBankName, "支払銀行名称"),
                (PaymentBankBranchName, "支払銀行支店名"),
                (Balance, "金額"),
                (DescriptionRightside, "割引銀行名及び支店名等"),
                (Description, "摘要"),
            ]),
            // Statement rows do not fit the note layout; amounts are spread
            // over the date/balance columns so nothing is lost.
            financial_statement: ColumnMapping::from_pairs([
                (MakerName, "account"),
                (IssueDate, "amount_0"),
                (Balance, "amount_0"),
                (DueDate, "amount_1"),
                (Description, "amount_2"),
            ]),
            loan_details: ColumnMapping::from_pairs([
                (MakerName, "借入先名称(氏名)"),
                (IssueDate, "借入先所在地(住所)"),
                (Balance, "期末現在高"),
                (DescriptionRightside, "期中の支払利子額"),
                (Description, "利率"),
            ]),
            headerless: ColumnMapping::from_pairs([
                (MakerName, 0usize),
                (IssueDate, 1),
                (DueDate, 2),
                (PaymentBankName, 3),
                (PaymentBankBranchName, 4),
                (Balance, 5),
                (DescriptionRightside, 6),
                (Description, 7),
            ]),
        }
    }
}

impl MappingSet {
    /// Loads the defaults, replacing each kind named in the JSON file at `path`.
    ///
    /// ```json
    /// {
    ///   "headerless": { "maker_name": 1, "balance": 4 },
    ///   "loan_details": { "maker_name": "借入先", "balance": "残高" }
    /// }
    /// ```
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading mappings file {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("parsing mappings file {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let overrides: MappingOverrides = serde_json::from_str(content)?;
        let mut set = Self::default();

        if let Some(m) = overrides.hand_bill {
            set.hand_bill = m;
        }
        if let Some(m) = overrides.financial_statement {
            set.financial_statement = m;
        }
        if let Some(m) = overrides.loan_details {
            set.loan_details = m;
        }
        if let Some(m) = overrides.headerless {
            set.headerless = m;
        }

        Ok(set)
    }

    pub fn for_kind(&self, kind: FileKind) -> &ColumnMapping {
        match kind {
            FileKind::HandBill => &self.hand_bill,
            FileKind::FinancialStatement => &self.financial_statement,
            FileKind::LoanDetails => &self.loan_details,
            FileKind::Headerless => &self.headerless,
        }
    }
}
