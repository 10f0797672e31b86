use crate::enums::Column;
use crate::error::CoreError;
use crate::structs::{Transaction, TransactionRow};
use serde::Serialize;
use std::collections::BTreeSet;

/// The set of columns a source actually supplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Schema {
    columns: BTreeSet<Column>,
}

impl Schema {
    pub fn new(columns: impl IntoIterator<Item = Column>) -> Self {
        Self {
            columns: columns.into_iter().collect(),
        }
    }

    /// A schema carrying every column.
    pub fn complete() -> Self {
        Self::new(Column::ALL)
    }

    pub fn contains(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    /// Fails with the first column in `columns` that is absent.
    pub fn require(&self, columns: &[Column]) -> Result<(), CoreError> {
        match columns.iter().find(|c| !self.contains(**c)) {
            Some(missing) => Err(CoreError::MissingColumn(*missing)),
            None => Ok(()),
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = Column> + '_ {
        self.columns.iter().copied()
    }
}

/// The schema-validated, derived-feature-augmented transaction dataset.
///
/// Derived fields are computed exactly once, here. The table only ever hands
/// out shared borrows, so every analysis sees the same immutable snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkingTable {
    schema: Schema,
    rows: Vec<TransactionRow>,
}

impl WorkingTable {
    /// Builds a table, failing fast if a required column is absent.
    pub fn new(schema: Schema, transactions: Vec<Transaction>) -> Result<Self, CoreError> {
        let required: Vec<Column> = Column::ALL.into_iter().filter(Column::is_required).collect();
        schema.require(&required)?;

        let rows: Vec<TransactionRow> = transactions.into_iter().map(TransactionRow::new).collect();
        tracing::debug!(rows = rows.len(), "Working table built.");

        Ok(Self { schema, rows })
    }

    /// Builds a table from records that carry every column.
    pub fn from_transactions(transactions: Vec<Transaction>) -> Self {
        let rows = transactions.into_iter().map(TransactionRow::new).collect();
        Self {
            schema: Schema::complete(),
            rows,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[TransactionRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Shorthand for `self.schema().require(columns)`.
    pub fn require(&self, columns: &[Column]) -> Result<(), CoreError> {
        self.schema.require(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_schema_without_required_column() {
        let schema = Schema::new(Column::ALL.into_iter().filter(|c| *c != Column::TotalAmount));
        let result = WorkingTable::new(schema, Vec::new());

        assert_eq!(result, Err(CoreError::MissingColumn(Column::TotalAmount)));
    }

    #[test]
    fn descriptive_columns_are_optional() {
        let schema = Schema::new(Column::ALL.into_iter().filter(Column::is_required));
        let table = WorkingTable::new(schema, Vec::new()).unwrap();

        assert!(table.is_empty());
        assert_eq!(table.require(&[Column::City]), Err(CoreError::MissingColumn(Column::City)));
        assert!(table.require(&[Column::CustomerId, Column::TotalAmount]).is_ok());
    }

    #[test]
    fn missing_optional_column_message() {
        let message = CoreError::MissingColumn(Column::Category).to_string();

        assert!(message.contains("'category' is missing from the source"));
        assert!(!message.contains("required"));
    }

    #[test]
    fn header_aliases_resolve() {
        assert_eq!(Column::from_header("TransactionID"), Some(Column::TransactionId));
        assert_eq!(Column::from_header(" Price "), Some(Column::UnitPrice));
        assert_eq!(Column::from_header("discount_pct"), Some(Column::DiscountPct));
        assert_eq!(Column::from_header("Date"), Some(Column::TransactionDate));
        assert_eq!(Column::from_header("Loyalty"), None);
    }
}
