//! Per-run identifier generation.
//!
//! Counters live for one run of the tool and are not persisted; a second
//! run starts the OCR sequence and maker codes from 1 again.

use chrono::NaiveDateTime;
use clap::ValueEnum;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

use crate::master::MasterData;

/// `jgroupid_string` used when the jgroupid master is empty.
pub const FALLBACK_JGROUPID: &str = "000";

/// How `maker_com_code` is assigned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum MakerCodeStrategy {
    /// Number distinct maker names `001`, `002`, ... in order of appearance.
    #[default]
    Sequential,
    /// Look the name up in the maker master; unknown names get an empty code.
    Master,
}

/// Identifiers shared by every row of one processed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIds {
    pub ocr_result_id: String,
    pub jgroupid_string: String,
    pub cif_number: String,
    pub settlement_at: String,
}

/// Generates OCR result ids, per-file random keys and maker codes.
pub struct IdGenerator {
    rng: StdRng,
    ocr_sequence: u32,
    strategy: MakerCodeStrategy,
    maker_codes: HashMap<String, String>,
    next_maker_code: u32,
}

impl IdGenerator {
    pub fn new(strategy: MakerCodeStrategy) -> Self {
        Self::with_rng(strategy, StdRng::from_entropy())
    }

    pub fn seeded(strategy: MakerCodeStrategy, seed: u64) -> Self {
        Self::with_rng(strategy, StdRng::seed_from_u64(seed))
    }

    fn with_rng(strategy: MakerCodeStrategy, rng: StdRng) -> Self {
        Self {
            rng,
            ocr_sequence: 0,
            strategy,
            maker_codes: HashMap::new(),
            next_maker_code: 1,
        }
    }

    /// `YYYYMMDDhhmmss` of `now` followed by the next 4-digit sequence number.
    pub fn next_ocr_result_id(&mut self, now: NaiveDateTime) -> String {
        self.ocr_sequence += 1;
        format!("{}{:04}", now.format("%Y%m%d%H%M%S"), self.ocr_sequence)
    }

    /// Draws the identifiers for the next file.
    pub fn next_file(&mut self, now: NaiveDateTime, jgroupids: &[String]) -> FileIds {
        let ocr_result_id = self.next_ocr_result_id(now);
        let jgroupid_string = jgroupids
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_else(|| FALLBACK_JGROUPID.to_string());
        let cif_number = self.rng.gen_range(100_000u32..=999_999).to_string();

        FileIds {
            ocr_result_id,
            jgroupid_string,
            cif_number,
            settlement_at: now.format("%Y%m").to_string(),
        }
    }

    /// Returns the `maker_com_code` for `maker_name` under the configured strategy.
    pub fn maker_com_code(&mut self, maker_name: &str, master: &MasterData) -> String {
        match self.strategy {
            MakerCodeStrategy::Master => master.company_code(maker_name).unwrap_or("").to_string(),
            MakerCodeStrategy::Sequential => {
                if let Some(code) = self.maker_codes.get(maker_name) {
                    return code.clone();
                }
                let code = format!("{:03}", self.next_maker_code);
                self.next_maker_code += 1;
                self.maker_codes.insert(maker_name.to_string(), code.clone());
                code
            }
        }
    }
}
