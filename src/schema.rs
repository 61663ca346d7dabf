//! The fixed 21-column load layout.

use serde::{Deserialize, Serialize};

/// Column names of the load table, in output order.
pub const TARGET_COLUMNS: [&str; 21] = [
    "ocr_result_id",
    "page_no",
    "id",
    "jgroupid_string",
    "cif_number",
    "settlement_at",
    "maker_name_original",
    "maker_name",
    "maker_com_code",
    "issue_date_rightside_date",
    "issue_date",
    "due_date_rightside_date",
    "due_date",
    "balance_rightside",
    "balance",
    "payment_bank_name_rightside",
    "payment_bank_name",
    "payment_bank_branch_name_rightside",
    "payment_bank_branch_name",
    "description_rightside",
    "description",
];

/// One row of a load file.
///
/// Field order is the serialization order and must stay in step with
/// [`TARGET_COLUMNS`]. Every field defaults so that files missing a column
/// still deserialize.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadRecord {
    pub ocr_result_id: String,
    pub page_no: String,
    pub id: String,
    pub jgroupid_string: String,
    pub cif_number: String,
    pub settlement_at: String,

    pub maker_name_original: String,
    pub maker_name: String,
    pub maker_com_code: String,

    pub issue_date_rightside_date: String,
    pub issue_date: String,
    pub due_date_rightside_date: String,
    pub due_date: String,
    pub balance_rightside: String,
    pub balance: String,
    pub payment_bank_name_rightside: String,
    pub payment_bank_name: String,
    pub payment_bank_branch_name_rightside: String,
    pub payment_bank_branch_name: String,
    pub description_rightside: String,
    pub description: String,
}

impl LoadRecord {
    /// Copies each mapped value into its `*_rightside` / `*_original` twin.
    ///
    /// `description_rightside` is mapped independently and left untouched.
    pub fn fill_derived(&mut self) {
        self.maker_name_original = self.maker_name.clone();
        self.issue_date_rightside_date = self.issue_date.clone();
        self.due_date_rightside_date = self.due_date.clone();
        self.balance_rightside = self.balance.clone();
        self.payment_bank_name_rightside = self.payment_bank_name.clone();
        self.payment_bank_branch_name_rightside = self.payment_bank_branch_name.clone();
    }
}
