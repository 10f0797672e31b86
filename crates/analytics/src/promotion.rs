//! Discounted-vs-undiscounted comparison of sales.
//!
//! A row is in the treatment group iff it carries a discount, otherwise it is
//! in the control group. Every row belongs to exactly one group.

use crate::aggregator::{EntityKey, GroupKey, RankMetric, RankedEntity, rank_where};
use crate::error::AnalyticsError;
use crate::metric::Ratio;
use crate::warning::{AnalysisWarning, Component};
use configuration::AnalysisSettings;
use core_types::{Column, TransactionRow, WorkingTable};
use rust_decimal::Decimal;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Descriptive metrics of one side of the split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupMetrics {
    pub transaction_count: usize,
    pub total_revenue: Decimal,
    pub total_quantity: u64,
    pub avg_transaction_value: Ratio,
    pub avg_quantity: Ratio,
    pub unique_customers: usize,
    pub revenue_share_pct: Ratio,
    pub transaction_share_pct: Ratio,
}

/// `(treatment - control) / control` for each compared metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LiftSet {
    /// The headline lift.
    pub avg_transaction_value: Ratio,
    pub total_revenue: Ratio,
    pub transaction_count: Ratio,
    pub avg_quantity: Ratio,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromotionComparison {
    /// Discounted rows.
    pub treatment: GroupMetrics,
    /// Undiscounted rows.
    pub control: GroupMetrics,
    pub lift: LiftSet,
}

/// A left-open, right-closed discount range in percent: `(lower, upper]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiscountBand {
    pub lower: Decimal,
    pub upper: Decimal,
}

impl DiscountBand {
    pub fn contains(&self, discount_pct: Decimal) -> bool {
        discount_pct > self.lower && discount_pct <= self.upper
    }
}

impl fmt::Display for DiscountBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}]%", self.lower.normalize(), self.upper.normalize())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BandMetrics {
    pub band: DiscountBand,
    pub transaction_count: usize,
    pub total_revenue: Decimal,
    pub total_quantity: u64,
    pub avg_transaction_value: Ratio,
    pub avg_quantity: Ratio,
}

/// Revenue of one product with and without discount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductLift {
    pub product_id: String,
    pub product_name: Option<String>,
    pub discounted_revenue: Decimal,
    pub undiscounted_revenue: Decimal,
    pub discounted_transactions: usize,
    pub undiscounted_transactions: usize,
    pub revenue_lift: Ratio,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromotionRoi {
    /// List price minus charged amount, summed over discounted rows.
    pub total_discount_given: Decimal,
    pub revenue_from_discounts: Decimal,
    /// `(revenue - discount given) / discount given * 100`.
    pub roi_pct: Ratio,
    pub avg_discount_pct: Ratio,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscountedProduct {
    pub product: RankedEntity,
    pub avg_discount_pct: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromotionAnalysis {
    pub comparison: PromotionComparison,
    /// One entry per configured band, ascending.
    pub discount_bands: Vec<BandMetrics>,
    /// Discounted rows falling outside every band.
    pub unbanded_transactions: usize,
    /// Products sold both with and without discount, by revenue lift descending.
    pub product_lift: Vec<ProductLift>,
    pub discount_only_products: Vec<String>,
    pub never_discounted_products: Vec<String>,
    pub roi: PromotionRoi,
    /// Best-selling products among discounted rows.
    pub top_discounted_products: Vec<DiscountedProduct>,
    pub warnings: Vec<AnalysisWarning>,
}

#[derive(Default)]
struct Totals<'a> {
    transactions: usize,
    revenue: Decimal,
    quantity: u64,
    customers: BTreeSet<&'a str>,
}

impl<'a> Totals<'a> {
    fn add(&mut self, row: &'a TransactionRow) {
        self.transactions += 1;
        self.revenue += row.record.total_amount;
        self.quantity += u64::from(row.record.quantity);
        self.customers.insert(row.record.customer_id.as_str());
    }

    fn metrics(&self, table_revenue: Decimal, table_rows: usize) -> GroupMetrics {
        GroupMetrics {
            transaction_count: self.transactions,
            total_revenue: self.revenue,
            total_quantity: self.quantity,
            avg_transaction_value: Ratio::mean(self.revenue, self.transactions),
            avg_quantity: Ratio::mean(Decimal::from(self.quantity), self.transactions),
            unique_customers: self.customers.len(),
            revenue_share_pct: Ratio::percentage(self.revenue, table_revenue),
            transaction_share_pct: Ratio::percentage(
                Decimal::from(self.transactions),
                Decimal::from(table_rows),
            ),
        }
    }
}

#[derive(Default)]
struct ProductSides<'a> {
    name: Option<&'a str>,
    discounted: (usize, Decimal),
    undiscounted: (usize, Decimal),
}

/// Compares discounted against undiscounted sales.
#[derive(Debug, Clone)]
pub struct PromotionComparator {
    bands: Vec<DiscountBand>,
    top_n: usize,
}

impl Default for PromotionComparator {
    fn default() -> Self {
        Self::from_settings(&AnalysisSettings::default())
    }
}

impl PromotionComparator {
    /// Builds the bands from consecutive `edges`. The edges are validated
    /// when the comparison runs.
    pub fn new(edges: &[Decimal], top_n: usize) -> Self {
        let bands = edges
            .windows(2)
            .map(|w| DiscountBand {
                lower: w[0],
                upper: w[1],
            })
            .collect();
        Self { bands, top_n }
    }

    pub fn from_settings(settings: &AnalysisSettings) -> Self {
        Self::new(&settings.discount_band_edges, settings.top_n)
    }

    pub fn bands(&self) -> &[DiscountBand] {
        &self.bands
    }

    pub fn compare(&self, table: &WorkingTable) -> Result<PromotionAnalysis, AnalyticsError> {
        self.validate()?;
        table.require(&[
            Column::ProductId,
            Column::CustomerId,
            Column::TotalAmount,
            Column::DiscountPct,
        ])?;

        let mut warnings = Vec::new();
        if table.is_empty() {
            warnings.push(AnalysisWarning::empty_input(Component::PromotionComparator));
        }

        let (treatment, control): (Vec<&TransactionRow>, Vec<&TransactionRow>) =
            table.rows().iter().partition(|row| row.derived.has_discount);

        let comparison = compare_groups(&treatment, &control, table.len());
        if !table.is_empty() {
            if control.is_empty() {
                warnings.push(AnalysisWarning::degenerate(
                    Component::PromotionComparator,
                    "control group is empty: no undiscounted transactions, lift is not computable",
                ));
            }
            if treatment.is_empty() {
                warnings.push(AnalysisWarning::degenerate(
                    Component::PromotionComparator,
                    "treatment group is empty: no discounted transactions",
                ));
            }
        }

        let (discount_bands, unbanded_transactions) = self.band_metrics(&treatment);
        if unbanded_transactions > 0 {
            warnings.push(AnalysisWarning::degenerate(
                Component::PromotionComparator,
                format!("{unbanded_transactions} discounted transaction(s) fall outside every discount band"),
            ));
        }

        let (product_lift, discount_only_products, never_discounted_products) =
            product_lift(table.rows());

        let top_discounted_products = self.top_discounted_products(table, &treatment)?;

        let analysis = PromotionAnalysis {
            comparison,
            discount_bands,
            unbanded_transactions,
            product_lift,
            discount_only_products,
            never_discounted_products,
            roi: roi(&treatment),
            top_discounted_products,
            warnings,
        };

        tracing::debug!(
            treatment = analysis.comparison.treatment.transaction_count,
            control = analysis.comparison.control.transaction_count,
            lift = %analysis.comparison.lift.avg_transaction_value,
            "Promotion comparison computed."
        );
        Ok(analysis)
    }

    fn validate(&self) -> Result<(), AnalyticsError> {
        if self.bands.is_empty() {
            return Err(AnalyticsError::InvalidParameter(
                "at least two discount band edges are required".to_string(),
            ));
        }
        if self.bands.iter().any(|b| b.lower >= b.upper) {
            return Err(AnalyticsError::InvalidParameter(
                "discount band edges must be strictly increasing".to_string(),
            ));
        }
        if self.top_n == 0 {
            return Err(AnalyticsError::InvalidParameter(
                "top_n must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn band_metrics(&self, treatment: &[&TransactionRow]) -> (Vec<BandMetrics>, usize) {
        let mut totals: Vec<(usize, Decimal, u64)> = vec![(0, Decimal::ZERO, 0); self.bands.len()];
        let mut unbanded = 0;

        for row in treatment {
            let discount = row.record.discount_pct;
            match self.bands.iter().position(|b| b.contains(discount)) {
                Some(i) => {
                    totals[i].0 += 1;
                    totals[i].1 += row.record.total_amount;
                    totals[i].2 += u64::from(row.record.quantity);
                }
                None => unbanded += 1,
            }
        }

        let metrics = self
            .bands
            .iter()
            .zip(totals)
            .map(|(band, (count, revenue, quantity))| BandMetrics {
                band: *band,
                transaction_count: count,
                total_revenue: revenue,
                total_quantity: quantity,
                avg_transaction_value: Ratio::mean(revenue, count),
                avg_quantity: Ratio::mean(Decimal::from(quantity), count),
            })
            .collect();
        (metrics, unbanded)
    }

    fn top_discounted_products(
        &self,
        table: &WorkingTable,
        treatment: &[&TransactionRow],
    ) -> Result<Vec<DiscountedProduct>, AnalyticsError> {
        let ranked = rank_where(
            table,
            GroupKey::ProductId,
            &[RankMetric::TotalRevenue, RankMetric::TotalQuantity],
            self.top_n,
            |row| row.derived.has_discount,
        )?;

        let mut discount_sums: BTreeMap<&str, (Decimal, usize)> = BTreeMap::new();
        for row in treatment {
            let entry = discount_sums.entry(row.record.product_id.as_str()).or_default();
            entry.0 += row.record.discount_pct;
            entry.1 += 1;
        }

        Ok(ranked
            .into_iter()
            .map(|product| {
                let (sum, count) = match &product.key {
                    EntityKey::Named(id) => {
                        discount_sums.get(id.as_str()).copied().unwrap_or_default()
                    }
                    EntityKey::Missing => (Decimal::ZERO, 0),
                };
                let avg_discount_pct = if count == 0 {
                    Decimal::ZERO
                } else {
                    sum / Decimal::from(count)
                };
                DiscountedProduct {
                    product,
                    avg_discount_pct,
                }
            })
            .collect())
    }
}

/// Runs the comparison with the default bands `(0,10]`, `(10,20]`, `(20,30]`,
/// `(30,50]`, `(50,100]`.
pub fn compare_promotion(table: &WorkingTable) -> Result<PromotionAnalysis, AnalyticsError> {
    PromotionComparator::default().compare(table)
}

fn compare_groups(
    treatment: &[&TransactionRow],
    control: &[&TransactionRow],
    table_rows: usize,
) -> PromotionComparison {
    let mut treatment_totals = Totals::default();
    let mut control_totals = Totals::default();
    treatment.iter().for_each(|row| treatment_totals.add(row));
    control.iter().for_each(|row| control_totals.add(row));

    let table_revenue = treatment_totals.revenue + control_totals.revenue;
    let treatment = treatment_totals.metrics(table_revenue, table_rows);
    let control = control_totals.metrics(table_revenue, table_rows);

    let lift = LiftSet {
        avg_transaction_value: Ratio::lift_between(
            treatment.avg_transaction_value,
            control.avg_transaction_value,
        ),
        total_revenue: Ratio::lift(treatment.total_revenue, control.total_revenue),
        transaction_count: Ratio::lift(
            Decimal::from(treatment.transaction_count),
            Decimal::from(control.transaction_count),
        ),
        avg_quantity: Ratio::lift_between(treatment.avg_quantity, control.avg_quantity),
    };

    PromotionComparison {
        treatment,
        control,
        lift,
    }
}

/// Splits products into those sold on both sides (ranked by revenue lift)
/// and those seen on one side only.
fn product_lift(rows: &[TransactionRow]) -> (Vec<ProductLift>, Vec<String>, Vec<String>) {
    let mut products: BTreeMap<&str, ProductSides> = BTreeMap::new();
    for row in rows {
        let record = &row.record;
        let sides = products.entry(record.product_id.as_str()).or_default();
        if let Some(name) = record.product_name.as_deref() {
            sides.name = Some(sides.name.map_or(name, |current| current.min(name)));
        }
        let side = if row.derived.has_discount {
            &mut sides.discounted
        } else {
            &mut sides.undiscounted
        };
        side.0 += 1;
        side.1 += record.total_amount;
    }

    let mut lifts = Vec::new();
    let mut discount_only = Vec::new();
    let mut never_discounted = Vec::new();

    for (id, sides) in products {
        match (sides.discounted.0, sides.undiscounted.0) {
            (0, _) => never_discounted.push(id.to_string()),
            (_, 0) => discount_only.push(id.to_string()),
            _ => lifts.push(ProductLift {
                product_id: id.to_string(),
                product_name: sides.name.map(str::to_string),
                discounted_revenue: sides.discounted.1,
                undiscounted_revenue: sides.undiscounted.1,
                discounted_transactions: sides.discounted.0,
                undiscounted_transactions: sides.undiscounted.0,
                revenue_lift: Ratio::lift(sides.discounted.1, sides.undiscounted.1),
            }),
        }
    }

    lifts.sort_by(|a, b| {
        let by_lift = match (a.revenue_lift.value(), b.revenue_lift.value()) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_lift.then_with(|| a.product_id.cmp(&b.product_id))
    });

    (lifts, discount_only, never_discounted)
}

fn roi(treatment: &[&TransactionRow]) -> PromotionRoi {
    let total_discount_given: Decimal = treatment.iter().map(|r| r.derived.discount_amount).sum();
    let revenue_from_discounts: Decimal = treatment.iter().map(|r| r.record.total_amount).sum();
    let discount_sum: Decimal = treatment.iter().map(|r| r.record.discount_pct).sum();

    PromotionRoi {
        total_discount_given,
        revenue_from_discounts,
        roi_pct: Ratio::percentage(
            revenue_from_discounts - total_discount_given,
            total_discount_given,
        ),
        avg_discount_pct: Ratio::mean(discount_sum, treatment.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{table, three_customers, tx};
    use rust_decimal_macros::dec;

    #[test]
    fn three_customer_scenario() {
        let analysis = compare_promotion(&three_customers()).unwrap();
        let PromotionComparison {
            treatment,
            control,
            lift,
        } = &analysis.comparison;

        assert_eq!(control.transaction_count, 2);
        assert_eq!(control.total_revenue, dec!(300));
        assert_eq!(control.avg_transaction_value, Ratio::Value(dec!(150)));
        assert_eq!(treatment.transaction_count, 1);
        assert_eq!(treatment.total_revenue, dec!(50));
        assert_eq!(lift.avg_transaction_value.round_dp(3), Ratio::Value(dec!(-0.667)));
        assert_eq!(lift.transaction_count, Ratio::Value(dec!(-0.5)));
        assert!(analysis.warnings.is_empty());
    }

    #[test]
    fn groups_partition_the_rows() {
        let t = table(vec![
            tx("T1", "A", dec!(10)),
            tx("T2", "A", dec!(20)).discount(dec!(5)),
            tx("T3", "B", dec!(30)).discount(dec!(50)),
            tx("T4", "C", dec!(40)),
            tx("T5", "C", dec!(50)).discount(dec!(100)),
        ]);
        let analysis = compare_promotion(&t).unwrap();
        let c = &analysis.comparison;

        assert_eq!(c.treatment.transaction_count + c.control.transaction_count, t.len());
        assert_eq!(c.treatment.transaction_count, 3);
    }

    #[test]
    fn lift_is_not_computable_without_control_revenue() {
        let t = table(vec![
            tx("T1", "A", dec!(10)).discount(dec!(10)),
            tx("T2", "B", dec!(20)).discount(dec!(20)),
        ]);
        let analysis = compare_promotion(&t).unwrap();
        let lift = analysis.comparison.lift;

        assert_eq!(lift.avg_transaction_value, Ratio::NotComputable);
        assert_eq!(lift.total_revenue, Ratio::NotComputable);
        assert_eq!(lift.transaction_count, Ratio::NotComputable);
        assert!(analysis.warnings.iter().any(|w| matches!(
            w,
            AnalysisWarning::DegenerateDistribution { component: Component::PromotionComparator, .. }
        )));
    }

    #[test]
    fn zero_revenue_control_is_not_computable() {
        let t = table(vec![
            tx("T1", "A", dec!(0)),
            tx("T2", "B", dec!(20)).discount(dec!(20)),
        ]);
        let lift = compare_promotion(&t).unwrap().comparison.lift;

        assert_eq!(lift.total_revenue, Ratio::NotComputable);
        assert_eq!(lift.avg_transaction_value, Ratio::NotComputable);
        assert_eq!(lift.transaction_count, Ratio::Value(dec!(0)));
    }

    #[test]
    fn bands_are_left_open_right_closed() {
        let t = table(vec![
            tx("T1", "A", dec!(10)),
            tx("T2", "A", dec!(10)).discount(dec!(10)),
            tx("T3", "A", dec!(10)).discount(dec!(10.5)),
            tx("T4", "A", dec!(10)).discount(dec!(30)),
            tx("T5", "A", dec!(10)).discount(dec!(50)),
            tx("T6", "A", dec!(10)).discount(dec!(75)),
        ]);
        let analysis = compare_promotion(&t).unwrap();
        let counts: Vec<usize> = analysis.discount_bands.iter().map(|b| b.transaction_count).collect();

        assert_eq!(counts, [1, 1, 1, 1, 1]);
        assert_eq!(analysis.unbanded_transactions, 0);
        assert_eq!(analysis.discount_bands[0].band.to_string(), "(0, 10]%");
        assert_eq!(analysis.discount_bands[4].total_revenue, dec!(10));
    }

    #[test]
    fn discounts_past_the_last_edge_are_unbanded() {
        let comparator = PromotionComparator::new(&[dec!(0), dec!(10), dec!(20)], 10);
        assert_eq!(comparator.bands().len(), 2);
        assert_eq!(comparator.bands()[1].to_string(), "(10, 20]%");

        let t = table(vec![
            tx("T1", "A", dec!(10)),
            tx("T2", "A", dec!(10)).discount(dec!(10)),
            tx("T3", "B", dec!(10)).discount(dec!(30)),
        ]);
        let analysis = comparator.compare(&t).unwrap();
        let counts: Vec<usize> = analysis.discount_bands.iter().map(|b| b.transaction_count).collect();

        assert_eq!(counts, [1, 0]);
        assert_eq!(analysis.unbanded_transactions, 1);
        assert!(analysis.warnings.iter().any(|w| matches!(
            w,
            AnalysisWarning::DegenerateDistribution { component: Component::PromotionComparator, detail }
                if detail.contains("outside every discount band")
        )));
    }

    #[test]
    fn empty_bands_are_still_reported() {
        let analysis = compare_promotion(&three_customers()).unwrap();
        let bands = &analysis.discount_bands;

        assert_eq!(bands.len(), 5);
        assert_eq!(bands[0].transaction_count, 1);
        assert_eq!(bands[1].transaction_count, 0);
        assert_eq!(bands[1].avg_transaction_value, Ratio::NotComputable);
    }

    #[test]
    fn product_lift_needs_both_groups() {
        let t = table(vec![
            tx("T1", "A", dec!(100)).product("P1"),
            tx("T2", "A", dec!(150)).product("P1").discount(dec!(10)),
            tx("T3", "A", dec!(100)).product("P2"),
            tx("T4", "A", dec!(50)).product("P2").discount(dec!(10)),
            tx("T5", "A", dec!(10)).product("P3").discount(dec!(10)),
            tx("T6", "A", dec!(10)).product("P4"),
        ]);
        let analysis = compare_promotion(&t).unwrap();

        let ids: Vec<&str> = analysis.product_lift.iter().map(|p| p.product_id.as_str()).collect();
        assert_eq!(ids, ["P1", "P2"]);
        assert_eq!(analysis.product_lift[0].revenue_lift, Ratio::Value(dec!(0.5)));
        assert_eq!(analysis.product_lift[1].revenue_lift, Ratio::Value(dec!(-0.5)));
        assert_eq!(analysis.discount_only_products, ["P3"]);
        assert_eq!(analysis.never_discounted_products, ["P4"]);
    }

    #[test]
    fn roi_from_discount_amounts() {
        // 80 charged on a 100 list price: 20 given away.
        let t = table(vec![tx("T1", "A", dec!(80)).discount(dec!(20)), tx("T2", "B", dec!(10))]);
        let roi = compare_promotion(&t).unwrap().roi;

        assert_eq!(roi.total_discount_given, dec!(20));
        assert_eq!(roi.revenue_from_discounts, dec!(80));
        assert_eq!(roi.roi_pct, Ratio::Value(dec!(300)));
        assert_eq!(roi.avg_discount_pct, Ratio::Value(dec!(20)));
    }

    #[test]
    fn top_discounted_products_carry_mean_discount() {
        let t = table(vec![
            tx("T1", "A", dec!(90)).product("P1").discount(dec!(10)),
            tx("T2", "A", dec!(70)).product("P1").discount(dec!(30)),
            tx("T3", "A", dec!(20)).product("P2").discount(dec!(20)),
            tx("T4", "A", dec!(500)).product("P3"),
        ]);
        let top = compare_promotion(&t).unwrap().top_discounted_products;

        assert_eq!(top.len(), 2);
        assert_eq!(top[0].product.key.to_string(), "P1");
        assert_eq!(top[0].avg_discount_pct, dec!(20));
        assert_eq!(top[0].product.total_revenue, dec!(160));
    }

    #[test]
    fn empty_table_returns_zeroed_result() {
        let analysis = compare_promotion(&table(Vec::new())).unwrap();

        assert_eq!(analysis.comparison.treatment.transaction_count, 0);
        assert_eq!(analysis.comparison.lift.avg_transaction_value, Ratio::NotComputable);
        assert!(analysis.product_lift.is_empty());
        assert_eq!(
            analysis.warnings,
            vec![AnalysisWarning::EmptyInput { component: Component::PromotionComparator }]
        );
    }

    #[test]
    fn rejects_invalid_bands() {
        let comparator = PromotionComparator::new(&[dec!(0), dec!(20), dec!(10)], 10);
        assert!(matches!(
            comparator.compare(&three_customers()),
            Err(AnalyticsError::InvalidParameter(_))
        ));
    }
}
