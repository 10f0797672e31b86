//! Column-level summaries for the exploration bundle.

use crate::aggregator::GroupKey;
use crate::error::AnalyticsError;
use crate::metric::Ratio;
use crate::quantile::quantile_sorted;
use crate::warning::{AnalysisWarning, Component};
use chrono::NaiveDate;
use core_types::{Column, TransactionRow, WorkingTable};
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

const TOP_VALUES: usize = 10;
const IQR_MULTIPLIER: Decimal = dec!(1.5);

const NUMERIC_COLUMNS: [Column; 4] = [
    Column::Quantity,
    Column::UnitPrice,
    Column::TotalAmount,
    Column::DiscountPct,
];

const CATEGORICAL_COLUMNS: [GroupKey; 5] = [
    GroupKey::ProductName,
    GroupKey::Category,
    GroupKey::StoreType,
    GroupKey::City,
    GroupKey::PaymentMethod,
];

/// Count, central tendency and spread of a set of decimal values.
///
/// Quartiles follow the crate-wide interpolation rule in [`crate::quantile`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NumericSummary {
    pub count: usize,
    pub mean: Decimal,
    /// Sample standard deviation; not computable for a single value.
    pub std_dev: Ratio,
    pub min: Decimal,
    pub q25: Decimal,
    pub median: Decimal,
    pub q75: Decimal,
    pub max: Decimal,
}

impl NumericSummary {
    /// Summarizes unsorted values. Returns `None` when there are none.
    pub fn new<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = Decimal>,
    {
        let mut values: Vec<Decimal> = values.into_iter().collect();
        values.sort();
        Self::from_sorted(&values)
    }

    /// Summarizes values already sorted in ascending order.
    pub fn from_sorted(sorted_values: &[Decimal]) -> Option<Self> {
        let (min, max) = (*sorted_values.first()?, *sorted_values.last()?);
        let count = sorted_values.len();
        let n = Decimal::from(count);
        let mean = sorted_values.iter().sum::<Decimal>() / n;

        let std_dev = if count < 2 {
            Ratio::NotComputable
        } else {
            let squares: Decimal = sorted_values.iter().map(|v| (*v - mean) * (*v - mean)).sum();
            let variance = squares / (n - Decimal::ONE);
            variance.sqrt().map_or(Ratio::NotComputable, Ratio::Value)
        };

        Some(Self {
            count,
            mean,
            std_dev,
            min,
            q25: quantile_sorted(sorted_values, dec!(0.25))?,
            median: quantile_sorted(sorted_values, dec!(0.5))?,
            q75: quantile_sorted(sorted_values, dec!(0.75))?,
            max,
        })
    }

    pub fn iqr(&self) -> Decimal {
        self.q75 - self.q25
    }
}

/// Values outside `[q25 - 1.5 * IQR, q75 + 1.5 * IQR]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutlierSummary {
    pub lower_fence: Decimal,
    pub upper_fence: Decimal,
    pub count: usize,
    pub share_pct: Ratio,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NumericColumnStats {
    pub column: Column,
    pub summary: NumericSummary,
    pub outliers: OutlierSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoricalSummary {
    pub column: Column,
    pub present: usize,
    pub missing: usize,
    pub distinct: usize,
    /// Most frequent value; the smallest value wins a tie.
    pub most_common: Option<String>,
    /// Up to ten values, by count descending then value ascending.
    pub top_values: Vec<ValueCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetOverview {
    pub row_count: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub total_revenue: Decimal,
    pub unique_customers: usize,
    pub unique_products: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DescriptiveStats {
    pub overview: DatasetOverview,
    /// Empty for an empty table.
    pub numeric: Vec<NumericColumnStats>,
    /// Only columns present in the table's schema are summarized.
    pub categorical: Vec<CategoricalSummary>,
    pub warnings: Vec<AnalysisWarning>,
}

/// Summarizes every numeric and descriptive column of the table.
pub fn describe(table: &WorkingTable) -> Result<DescriptiveStats, AnalyticsError> {
    table.require(&NUMERIC_COLUMNS)?;

    let mut warnings = Vec::new();
    if table.is_empty() {
        warnings.push(AnalysisWarning::empty_input(Component::Descriptive));
    }

    let numeric = NUMERIC_COLUMNS
        .iter()
        .filter_map(|column| numeric_column(table.rows(), *column))
        .collect();

    let categorical = CATEGORICAL_COLUMNS
        .iter()
        .filter(|key| table.schema().contains(key.column()))
        .map(|key| categorical_column(table.rows(), *key))
        .collect();

    Ok(DescriptiveStats {
        overview: overview(table.rows()),
        numeric,
        categorical,
        warnings,
    })
}

fn numeric_value(row: &TransactionRow, column: Column) -> Option<Decimal> {
    let record = &row.record;
    match column {
        Column::Quantity => Some(Decimal::from(record.quantity)),
        Column::UnitPrice => Some(record.unit_price),
        Column::TotalAmount => Some(record.total_amount),
        Column::DiscountPct => Some(record.discount_pct),
        _ => None,
    }
}

fn numeric_column(rows: &[TransactionRow], column: Column) -> Option<NumericColumnStats> {
    let mut values: Vec<Decimal> = rows.iter().filter_map(|row| numeric_value(row, column)).collect();
    values.sort();
    let summary = NumericSummary::from_sorted(&values)?;

    let spread = IQR_MULTIPLIER * summary.iqr();
    let lower_fence = summary.q25 - spread;
    let upper_fence = summary.q75 + spread;
    let count = values
        .iter()
        .filter(|v| **v < lower_fence || **v > upper_fence)
        .count();

    if count > 0 {
        tracing::debug!(%column, count, %lower_fence, %upper_fence, "Outliers detected.");
    }

    Some(NumericColumnStats {
        column,
        outliers: OutlierSummary {
            lower_fence,
            upper_fence,
            count,
            share_pct: Ratio::percentage(Decimal::from(count), Decimal::from(values.len())),
        },
        summary,
    })
}

fn categorical_column(rows: &[TransactionRow], key: GroupKey) -> CategoricalSummary {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    let mut missing = 0;
    for row in rows {
        match key.value(&row.record) {
            Some(value) => *counts.entry(value).or_default() += 1,
            None => missing += 1,
        }
    }

    let mut by_count: Vec<(&str, usize)> = counts.iter().map(|(v, c)| (*v, *c)).collect();
    by_count.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    CategoricalSummary {
        column: key.column(),
        present: rows.len() - missing,
        missing,
        distinct: counts.len(),
        most_common: by_count.first().map(|(value, _)| value.to_string()),
        top_values: by_count
            .into_iter()
            .take(TOP_VALUES)
            .map(|(value, count)| ValueCount {
                value: value.to_string(),
                count,
            })
            .collect(),
    }
}

fn overview(rows: &[TransactionRow]) -> DatasetOverview {
    let customers: BTreeSet<&str> = rows.iter().map(|r| r.record.customer_id.as_str()).collect();
    let products: BTreeSet<&str> = rows.iter().map(|r| r.record.product_id.as_str()).collect();

    DatasetOverview {
        row_count: rows.len(),
        first_date: rows.iter().map(|r| r.record.transaction_date).min(),
        last_date: rows.iter().map(|r| r.record.transaction_date).max(),
        total_revenue: rows.iter().map(|r| r.record.total_amount).sum(),
        unique_customers: customers.len(),
        unique_products: products.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{table, three_customers, tx};
    use core_types::{Schema, WorkingTable};

    #[test]
    fn numeric_summary_matches_quantile_rule() {
        let summary = NumericSummary::new([dec!(4), dec!(1), dec!(3), dec!(2)]).unwrap();

        assert_eq!(summary.count, 4);
        assert_eq!(summary.mean, dec!(2.5));
        assert_eq!(summary.min, dec!(1));
        assert_eq!(summary.q25, dec!(1.75));
        assert_eq!(summary.median, dec!(2.5));
        assert_eq!(summary.q75, dec!(3.25));
        assert_eq!(summary.max, dec!(4));
        assert_eq!(summary.iqr(), dec!(1.5));
    }

    #[test]
    fn single_value_has_no_std_dev() {
        let summary = NumericSummary::new([dec!(7)]).unwrap();
        assert_eq!(summary.std_dev, Ratio::NotComputable);
        assert!(NumericSummary::new(Vec::new()).is_none());
    }

    #[test]
    fn counts_iqr_outliers() {
        let mut rows: Vec<_> = (1..=8)
            .map(|i| tx(&format!("T{i}"), "A", Decimal::from(10 + i)))
            .collect();
        rows.push(tx("T9", "B", dec!(1000)));
        let stats = describe(&table(rows)).unwrap();

        let total = stats
            .numeric
            .iter()
            .find(|s| s.column == Column::TotalAmount)
            .unwrap();
        assert_eq!(total.outliers.count, 1);
        assert_eq!(total.summary.max, dec!(1000));
    }

    #[test]
    fn categorical_cardinality_and_missing() {
        let t = table(vec![
            tx("T1", "A", dec!(10)).city(Some("Oslo")),
            tx("T2", "A", dec!(10)).city(Some("Bergen")),
            tx("T3", "B", dec!(10)).city(Some("Oslo")),
            tx("T4", "B", dec!(10)).city(None),
        ]);
        let stats = describe(&t).unwrap();
        let city = stats
            .categorical
            .iter()
            .find(|c| c.column == Column::City)
            .unwrap();

        assert_eq!(city.present, 3);
        assert_eq!(city.missing, 1);
        assert_eq!(city.distinct, 2);
        assert_eq!(city.most_common.as_deref(), Some("Oslo"));
        assert_eq!(city.top_values[1].value, "Bergen");
    }

    #[test]
    fn absent_descriptive_columns_are_skipped() {
        let schema = Schema::new(Column::ALL.into_iter().filter(|c| *c != Column::City));
        let transactions = vec![tx("T1", "A", dec!(10)).build()];
        let t = WorkingTable::new(schema, transactions).unwrap();
        let stats = describe(&t).unwrap();

        assert_eq!(stats.categorical.len(), 4);
        assert!(stats.categorical.iter().all(|c| c.column != Column::City));
    }

    #[test]
    fn overview_of_scenario() {
        let overview = describe(&three_customers()).unwrap().overview;

        assert_eq!(overview.row_count, 3);
        assert_eq!(overview.total_revenue, dec!(350));
        assert_eq!(overview.unique_customers, 3);
        assert_eq!(overview.unique_products, 2);
    }

    #[test]
    fn empty_table() {
        let stats = describe(&table(Vec::new())).unwrap();

        assert!(stats.numeric.is_empty());
        assert_eq!(stats.overview.first_date, None);
        assert_eq!(
            stats.warnings,
            vec![AnalysisWarning::EmptyInput { component: Component::Descriptive }]
        );
    }
}
