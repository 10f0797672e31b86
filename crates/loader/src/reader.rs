use crate::error::LoaderError;
use crate::report::{DropReason, LoadReport};
use chrono::{NaiveDate, NaiveDateTime};
use configuration::DataSettings;
use core_types::{Column, Schema, Transaction, WorkingTable};
use csv::StringRecord;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// A loaded table together with the account of what was dropped on the way.
#[derive(Debug)]
pub struct LoadOutcome {
    pub table: WorkingTable,
    pub report: LoadReport,
}

/// Position of each recognised column in the header row.
struct ColumnIndex(HashMap<Column, usize>);

impl ColumnIndex {
    /// Maps headers to columns. The first header wins when two map to the
    /// same column; unrecognised headers are returned separately.
    fn from_headers(headers: &StringRecord) -> (Self, Vec<String>) {
        let mut index = HashMap::new();
        let mut ignored = Vec::new();
        for (position, header) in headers.iter().enumerate() {
            let header = header.trim_start_matches('\u{feff}');
            match Column::from_header(header) {
                Some(column) => {
                    index.entry(column).or_insert(position);
                }
                None => ignored.push(header.to_string()),
            }
        }
        (Self(index), ignored)
    }

    fn schema(&self) -> Schema {
        Schema::new(self.0.keys().copied())
    }

    fn field<'r>(&self, record: &'r StringRecord, column: Column) -> Option<&'r str> {
        self.0
            .get(&column)
            .and_then(|position| record.get(*position))
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

struct ParsedRow {
    transaction: Transaction,
    defaulted_discount: bool,
}

/// Loads and cleans a transaction CSV file.
pub fn load_csv(path: &Path, settings: &DataSettings) -> Result<LoadOutcome, LoaderError> {
    let file = File::open(path).map_err(|source| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), "Loading transactions.");
    load_from_reader(file, settings)
}

/// Loads and cleans transactions from any CSV source.
///
/// Rows with a missing or unparsable required value, rows whose total
/// disagrees with their price and discount beyond `amount_tolerance`, and
/// repeated transaction ids (after the first valid occurrence) are dropped
/// and counted. Fails when a required column is absent from the header.
pub fn load_from_reader<R: Read>(
    reader: R,
    settings: &DataSettings,
) -> Result<LoadOutcome, LoaderError> {
    if !settings.delimiter.is_ascii() {
        return Err(LoaderError::InvalidDelimiter(settings.delimiter));
    }

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(settings.delimiter as u8)
        .flexible(true)
        .from_reader(reader);

    let (index, ignored_headers) = ColumnIndex::from_headers(rdr.headers()?);
    let schema = index.schema();
    let required: Vec<Column> = Column::ALL.into_iter().filter(Column::is_required).collect();
    schema.require(&required)?;

    if !ignored_headers.is_empty() {
        tracing::debug!(headers = ?ignored_headers, "Ignoring unrecognised columns.");
    }

    let descriptive: Vec<Column> = schema.columns().filter(Column::is_descriptive).collect();
    let mut report = LoadReport {
        ignored_headers,
        ..LoadReport::default()
    };
    let mut seen_ids = HashSet::new();
    let mut transactions = Vec::new();

    for (i, result) in rdr.records().enumerate() {
        let record = result?;
        let line = i + 2;
        report.rows_read += 1;

        let parsed = parse_row(&record, &index).and_then(|row| {
            check_amount(&row.transaction, settings.amount_tolerance)?;
            if !seen_ids.insert(row.transaction.transaction_id.clone()) {
                return Err(DropReason::DuplicateId);
            }
            Ok(row)
        });

        match parsed {
            Ok(row) => {
                if row.defaulted_discount {
                    report.defaulted_discounts += 1;
                }
                for column in &descriptive {
                    if index.field(&record, *column).is_none() {
                        *report.missing_descriptive.entry(*column).or_default() += 1;
                    }
                }
                transactions.push(row.transaction);
            }
            Err(reason) => {
                tracing::debug!(line, %reason, "Row dropped.");
                report.record_drop(reason);
            }
        }
    }

    report.rows_loaded = transactions.len();
    if report.rows_dropped() > 0 {
        tracing::warn!(
            read = report.rows_read,
            loaded = report.rows_loaded,
            duplicates = report.duplicate_ids,
            missing = report.missing_values,
            invalid = report.invalid_values,
            amount_mismatches = report.amount_mismatches,
            "Rows dropped while loading."
        );
    } else {
        tracing::info!(rows = report.rows_loaded, "All rows loaded.");
    }

    let table = WorkingTable::new(schema, transactions)?;
    Ok(LoadOutcome { table, report })
}

fn parse_row(record: &StringRecord, index: &ColumnIndex) -> Result<ParsedRow, DropReason> {
    let required = |column: Column| index.field(record, column).ok_or(DropReason::MissingValue(column));
    let optional = |column: Column| index.field(record, column).map(str::to_string);

    let quantity = parse_amount(required(Column::Quantity)?, Column::Quantity)?;
    let quantity = quantity
        .fract()
        .is_zero()
        .then(|| quantity.to_u32())
        .flatten()
        .ok_or(DropReason::InvalidValue(Column::Quantity))?;

    let (discount_pct, defaulted_discount) = match index.field(record, Column::DiscountPct) {
        Some(raw) => (parse_amount(raw, Column::DiscountPct)?, false),
        None => (Decimal::ZERO, true),
    };
    if discount_pct > Decimal::ONE_HUNDRED {
        return Err(DropReason::InvalidValue(Column::DiscountPct));
    }

    let transaction = Transaction {
        transaction_id: required(Column::TransactionId)?.to_string(),
        customer_id: required(Column::CustomerId)?.to_string(),
        product_id: required(Column::ProductId)?.to_string(),
        product_name: optional(Column::ProductName),
        category: optional(Column::Category),
        store_type: optional(Column::StoreType),
        city: optional(Column::City),
        payment_method: optional(Column::PaymentMethod),
        quantity,
        unit_price: parse_amount(required(Column::UnitPrice)?, Column::UnitPrice)?,
        total_amount: parse_amount(required(Column::TotalAmount)?, Column::TotalAmount)?,
        discount_pct,
        transaction_date: parse_date(required(Column::TransactionDate)?)
            .ok_or(DropReason::InvalidValue(Column::TransactionDate))?,
    };

    Ok(ParsedRow {
        transaction,
        defaulted_discount,
    })
}

/// Parses a non-negative decimal.
fn parse_amount(raw: &str, column: Column) -> Result<Decimal, DropReason> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
        .filter(|value| !value.is_sign_negative() || value.is_zero())
        .ok_or(DropReason::InvalidValue(column))
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
                .map(|datetime| datetime.date())
        })
}

fn check_amount(transaction: &Transaction, tolerance: Decimal) -> Result<(), DropReason> {
    let keep = Decimal::ONE - transaction.discount_pct / Decimal::ONE_HUNDRED;
    let expected = Decimal::from(transaction.quantity) * transaction.unit_price * keep;
    if (transaction.total_amount - expected).abs() > tolerance {
        return Err(DropReason::AmountMismatch);
    }
    Ok(())
}
