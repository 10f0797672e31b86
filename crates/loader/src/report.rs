use core_types::Column;
use std::collections::BTreeMap;
use std::fmt;

/// Why a CSV row was left out of the working table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    DuplicateId,
    MissingValue(Column),
    InvalidValue(Column),
    /// `total_amount` disagrees with `quantity * unit_price * (1 - discount / 100)`.
    AmountMismatch,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::DuplicateId => f.write_str("duplicate transaction_id"),
            DropReason::MissingValue(column) => write!(f, "missing value in '{column}'"),
            DropReason::InvalidValue(column) => write!(f, "invalid value in '{column}'"),
            DropReason::AmountMismatch => f.write_str("total_amount outside tolerance"),
        }
    }
}

/// What happened to the rows of one CSV source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub rows_read: usize,
    pub rows_loaded: usize,
    pub duplicate_ids: usize,
    pub missing_values: usize,
    pub invalid_values: usize,
    pub amount_mismatches: usize,
    /// Rows whose empty discount cell was read as 0.
    pub defaulted_discounts: usize,
    /// Kept rows with no value, per descriptive column present in the source.
    pub missing_descriptive: BTreeMap<Column, usize>,
    /// Headers that match no known column.
    pub ignored_headers: Vec<String>,
}

impl LoadReport {
    pub fn rows_dropped(&self) -> usize {
        self.duplicate_ids + self.missing_values + self.invalid_values + self.amount_mismatches
    }

    pub(crate) fn record_drop(&mut self, reason: DropReason) {
        match reason {
            DropReason::DuplicateId => self.duplicate_ids += 1,
            DropReason::MissingValue(_) => self.missing_values += 1,
            DropReason::InvalidValue(_) => self.invalid_values += 1,
            DropReason::AmountMismatch => self.amount_mismatches += 1,
        }
    }
}
