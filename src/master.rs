//! Maker and jgroupid master tables.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{error, info, warn};

use crate::parser::decode;

pub const MAKER_MASTER_FILE: &str = "master.csv";
pub const JGROUPID_MASTER_FILE: &str = "jgroupid_master.csv";

/// Used when `master.csv` is absent.
const DEFAULT_COMPANIES: &[(&str, &str)] = &[
    ("(株)双文社印刷", "4380946945"),
    ("(株)太平印刷社", "9138429316"),
    ("(株)リーブルテック", "2578916640"),
    ("日本ハイコム(株)", "5408006886"),
    ("(株)新寿堂", "0668992415"),
    ("手持手形計", "9443492307"),
    ("割引手形計", "4417864013"),
    ("(株)シーフォース", "7398659210"),
];

/// Highest jgroupid in the built-in master (`001`..=`093`).
const DEFAULT_JGROUPID_MAX: u32 = 93;

#[derive(Debug, Deserialize)]
struct CompanyRow {
    #[serde(rename = "会社名")]
    name: String,
    #[serde(rename = "会社コード")]
    code: String,
}

#[derive(Debug, Deserialize)]
struct JgroupidRow {
    jgroupid: String,
}

/// Lookup tables read from the master data directory.
#[derive(Debug, Clone, Default)]
pub struct MasterData {
    companies: HashMap<String, String>,
    jgroupids: Vec<String>,
}

impl MasterData {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        Self {
            companies: default_companies(),
            jgroupids: default_jgroupids(),
        }
    }

    /// Loads both masters from `dir`.
    ///
    /// A missing file falls back to the built-in table; an unreadable one
    /// leaves that table empty. Neither case is fatal.
    #[tracing::instrument(skip_all, fields(dir = %dir.display()))]
    pub fn load(dir: &Path) -> Self {
        let maker_path = dir.join(MAKER_MASTER_FILE);
        let companies = if !maker_path.exists() {
            warn!(path = %maker_path.display(), "Maker master not found, using built-in table");
            default_companies()
        } else {
            match read_rows::<CompanyRow>(&maker_path) {
                Ok(rows) => rows.into_iter().map(|r| (r.name, r.code)).collect(),
                Err(e) => {
                    error!(path = %maker_path.display(), error = %e, "Failed to read maker master");
                    HashMap::new()
                }
            }
        };

        let jgroupid_path = dir.join(JGROUPID_MASTER_FILE);
        let jgroupids = if !jgroupid_path.exists() {
            warn!(path = %jgroupid_path.display(), "jgroupid master not found, using built-in table");
            default_jgroupids()
        } else {
            match read_rows::<JgroupidRow>(&jgroupid_path) {
                Ok(rows) => rows.into_iter().map(|r| r.jgroupid).collect(),
                Err(e) => {
                    error!(path = %jgroupid_path.display(), error = %e, "Failed to read jgroupid master");
                    Vec::new()
                }
            }
        };

        info!(
            companies = companies.len(),
            jgroupids = jgroupids.len(),
            "Master data loaded"
        );
        Self {
            companies,
            jgroupids,
        }
    }

    pub fn company_code(&self, name: &str) -> Option<&str> {
        self.companies.get(name).map(String::as_str)
    }

    pub fn jgroupids(&self) -> &[String] {
        &self.jgroupids
    }
}

fn read_rows<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let (text, _) = decode(&bytes)?;

    let mut rdr = csv::Reader::from_reader(text.as_bytes());
    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let record: T = result?;
        rows.push(record);
    }
    Ok(rows)
}

fn default_companies() -> HashMap<String, String> {
    DEFAULT_COMPANIES
        .iter()
        .map(|(n, c)| (n.to_string(), c.to_string()))
        .collect()
}

fn default_jgroupids() -> Vec<String> {
    (1..=DEFAULT_JGROUPID_MAX).map(|i| format!("{i:03}")).collect()
}
