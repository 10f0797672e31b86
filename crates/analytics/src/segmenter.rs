//! Quantile-based customer value segmentation.

use crate::aggregator::{GroupKey, RankMetric, RankedEntity, rank_where};
use crate::descriptive::NumericSummary;
use crate::error::AnalyticsError;
use crate::metric::Ratio;
use crate::quantile::quantile_sorted;
use crate::warning::{AnalysisWarning, Component};
use chrono::NaiveDate;
use configuration::AnalysisSettings;
use core_types::{Column, WorkingTable};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Fewer distinct customers than this cannot be split into terciles.
pub const MIN_CUSTOMERS_FOR_SEGMENTATION: usize = 3;

/// Number of transaction-count buckets kept in the frequency distribution.
const FREQUENCY_BUCKETS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Segment {
    High,
    Medium,
    Low,
}

impl Segment {
    /// All segments, from most to least valuable.
    pub const ALL: [Segment; 3] = [Segment::High, Segment::Medium, Segment::Low];
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Segment::High => "High Value",
            Segment::Medium => "Medium Value",
            Segment::Low => "Low Value",
        };
        f.write_str(label)
    }
}

/// The spending values separating the segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SegmentBoundaries {
    pub lower_quantile: Decimal,
    pub upper_quantile: Decimal,
    /// Customers spending at least this much (and less than `upper`) are Medium.
    pub lower: Decimal,
    /// Customers spending at least this much are High.
    pub upper: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentSummary {
    pub segment: Segment,
    pub customer_count: usize,
    pub transaction_count: usize,
    pub total_revenue: Decimal,
    pub avg_transaction_value: Ratio,
    pub avg_spending_per_customer: Ratio,
    pub customer_share_pct: Ratio,
    pub revenue_share_pct: Ratio,
}

/// Per-customer aggregates the segmentation is computed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerProfile {
    pub customer_id: String,
    pub total_spending: Decimal,
    pub transaction_count: usize,
    pub avg_transaction_value: Decimal,
    pub first_purchase: NaiveDate,
    pub last_purchase: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrequencyBucket {
    pub transactions: usize,
    pub customers: usize,
    pub customer_share_pct: Ratio,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerSegmentation {
    pub assignments: BTreeMap<String, Segment>,
    /// Always High, Medium, Low in that order.
    pub summaries: Vec<SegmentSummary>,
    /// `None` when the distribution was too small to split.
    pub boundaries: Option<SegmentBoundaries>,
    /// Sorted by customer id.
    pub customers: Vec<CustomerProfile>,
    /// Summary of per-customer total spending.
    pub spending_distribution: Option<NumericSummary>,
    pub total_customers: usize,
    pub total_transactions: usize,
    pub avg_transaction_value: Ratio,
    /// Mean number of transactions per customer.
    pub visit_frequency: Ratio,
    /// Fraction of customers with more than one transaction.
    pub repeat_purchase_rate: Ratio,
    /// Customers per transaction count, ascending, first ten counts.
    pub frequency_distribution: Vec<FrequencyBucket>,
    pub warnings: Vec<AnalysisWarning>,
}

impl CustomerSegmentation {
    pub fn segment_of(&self, customer_id: &str) -> Option<Segment> {
        self.assignments.get(customer_id).copied()
    }

    pub fn summary(&self, segment: Segment) -> Option<&SegmentSummary> {
        self.summaries.iter().find(|s| s.segment == segment)
    }
}

/// Top categories and products bought by one segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentPreference {
    pub segment: Segment,
    pub top_categories: Vec<RankedEntity>,
    pub top_products: Vec<RankedEntity>,
}

/// Splits customers into High/Medium/Low value segments by total spending.
#[derive(Debug, Clone, Copy)]
pub struct Segmenter {
    lower_quantile: Decimal,
    upper_quantile: Decimal,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::from_settings(&AnalysisSettings::default())
    }
}

struct CustomerAccumulator {
    spending: Decimal,
    transactions: usize,
    first: NaiveDate,
    last: NaiveDate,
}

impl Segmenter {
    pub fn new(lower_quantile: Decimal, upper_quantile: Decimal) -> Self {
        Self {
            lower_quantile,
            upper_quantile,
        }
    }

    pub fn from_settings(settings: &AnalysisSettings) -> Self {
        Self::new(settings.lower_segment_quantile, settings.upper_segment_quantile)
    }

    pub fn segment(&self, table: &WorkingTable) -> Result<CustomerSegmentation, AnalyticsError> {
        table.require(&[Column::CustomerId, Column::TotalAmount, Column::TransactionDate])?;

        let mut warnings = Vec::new();
        let profiles = customer_profiles(table);

        if profiles.is_empty() {
            warnings.push(AnalysisWarning::empty_input(Component::Segmenter));
        }

        let mut sorted_spending: Vec<Decimal> = profiles.iter().map(|p| p.total_spending).collect();
        sorted_spending.sort();

        let boundaries = if profiles.len() < MIN_CUSTOMERS_FOR_SEGMENTATION {
            if !profiles.is_empty() {
                warnings.push(AnalysisWarning::degenerate(
                    Component::Segmenter,
                    format!(
                        "only {} distinct customer(s); at least {} are needed for a tercile split, all customers assigned Medium",
                        profiles.len(),
                        MIN_CUSTOMERS_FOR_SEGMENTATION
                    ),
                ));
            }
            None
        } else {
            Some(self.boundaries(&sorted_spending)?)
        };

        let assignments: BTreeMap<String, Segment> = profiles
            .iter()
            .map(|p| (p.customer_id.clone(), assign(p.total_spending, boundaries.as_ref())))
            .collect();

        let total_revenue: Decimal = profiles.iter().map(|p| p.total_spending).sum();
        let total_transactions: usize = profiles.iter().map(|p| p.transaction_count).sum();
        let summaries = Segment::ALL
            .iter()
            .map(|segment| {
                summarize(*segment, &profiles, &assignments, total_revenue, profiles.len())
            })
            .collect();

        let repeat_customers = profiles.iter().filter(|p| p.transaction_count > 1).count();
        let segmentation = CustomerSegmentation {
            assignments,
            summaries,
            boundaries,
            spending_distribution: NumericSummary::from_sorted(&sorted_spending),
            total_customers: profiles.len(),
            total_transactions,
            avg_transaction_value: Ratio::mean(total_revenue, total_transactions),
            visit_frequency: Ratio::mean(Decimal::from(total_transactions), profiles.len()),
            repeat_purchase_rate: Ratio::of(
                Decimal::from(repeat_customers),
                Decimal::from(profiles.len()),
            ),
            frequency_distribution: frequency_distribution(&profiles),
            customers: profiles,
            warnings,
        };

        tracing::debug!(
            customers = segmentation.total_customers,
            boundaries = ?segmentation.boundaries,
            "Customer segmentation computed."
        );
        Ok(segmentation)
    }

    fn boundaries(&self, sorted_spending: &[Decimal]) -> Result<SegmentBoundaries, AnalyticsError> {
        let cut = |q: Decimal| {
            quantile_sorted(sorted_spending, q).ok_or_else(|| {
                AnalyticsError::InvalidParameter(format!("segment quantile {q} is outside [0, 1]"))
            })
        };
        Ok(SegmentBoundaries {
            lower_quantile: self.lower_quantile,
            upper_quantile: self.upper_quantile,
            lower: cut(self.lower_quantile)?,
            upper: cut(self.upper_quantile)?,
        })
    }
}

/// Segments customers with the default 33rd/67th percentile boundaries.
pub fn segment_customers(table: &WorkingTable) -> Result<CustomerSegmentation, AnalyticsError> {
    Segmenter::default().segment(table)
}

/// Top categories and top products by revenue within each segment.
pub fn segment_preferences(
    table: &WorkingTable,
    segmentation: &CustomerSegmentation,
    top_n: usize,
) -> Result<Vec<SegmentPreference>, AnalyticsError> {
    let metrics = [RankMetric::TotalRevenue, RankMetric::TotalQuantity];
    let mut preferences = Vec::new();

    for segment in Segment::ALL {
        let in_segment =
            |row: &core_types::TransactionRow| segmentation.segment_of(&row.record.customer_id) == Some(segment);
        if !table.rows().iter().any(in_segment) {
            continue;
        }
        preferences.push(SegmentPreference {
            segment,
            top_categories: rank_where(table, GroupKey::Category, &metrics, top_n, in_segment)?,
            top_products: rank_where(table, GroupKey::ProductId, &metrics, top_n, in_segment)?,
        });
    }
    Ok(preferences)
}

fn customer_profiles(table: &WorkingTable) -> Vec<CustomerProfile> {
    let mut customers: BTreeMap<&str, CustomerAccumulator> = BTreeMap::new();
    for row in table.rows() {
        let record = &row.record;
        let date = record.transaction_date;
        customers
            .entry(record.customer_id.as_str())
            .and_modify(|c| {
                c.spending += record.total_amount;
                c.transactions += 1;
                c.first = c.first.min(date);
                c.last = c.last.max(date);
            })
            .or_insert(CustomerAccumulator {
                spending: record.total_amount,
                transactions: 1,
                first: date,
                last: date,
            });
    }

    customers
        .into_iter()
        .map(|(id, c)| CustomerProfile {
            customer_id: id.to_string(),
            total_spending: c.spending,
            transaction_count: c.transactions,
            avg_transaction_value: c.spending / Decimal::from(c.transactions),
            first_purchase: c.first,
            last_purchase: c.last,
        })
        .collect()
}

/// Zero (or negative) total spend is always Low. Without boundaries every
/// customer is Medium.
fn assign(spending: Decimal, boundaries: Option<&SegmentBoundaries>) -> Segment {
    let Some(b) = boundaries else {
        return Segment::Medium;
    };
    if spending <= Decimal::ZERO {
        Segment::Low
    } else if spending >= b.upper {
        Segment::High
    } else if spending >= b.lower {
        Segment::Medium
    } else {
        Segment::Low
    }
}

fn summarize(
    segment: Segment,
    profiles: &[CustomerProfile],
    assignments: &BTreeMap<String, Segment>,
    total_revenue: Decimal,
    total_customers: usize,
) -> SegmentSummary {
    let members: Vec<&CustomerProfile> = profiles
        .iter()
        .filter(|p| assignments.get(&p.customer_id) == Some(&segment))
        .collect();
    let revenue: Decimal = members.iter().map(|p| p.total_spending).sum();
    let transactions: usize = members.iter().map(|p| p.transaction_count).sum();

    SegmentSummary {
        segment,
        customer_count: members.len(),
        transaction_count: transactions,
        total_revenue: revenue,
        avg_transaction_value: Ratio::mean(revenue, transactions),
        avg_spending_per_customer: Ratio::mean(revenue, members.len()),
        customer_share_pct: Ratio::percentage(
            Decimal::from(members.len()),
            Decimal::from(total_customers),
        ),
        revenue_share_pct: Ratio::percentage(revenue, total_revenue),
    }
}

fn frequency_distribution(profiles: &[CustomerProfile]) -> Vec<FrequencyBucket> {
    let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
    for profile in profiles {
        *counts.entry(profile.transaction_count).or_default() += 1;
    }
    counts
        .into_iter()
        .take(FREQUENCY_BUCKETS)
        .map(|(transactions, customers)| FrequencyBucket {
            transactions,
            customers,
            customer_share_pct: Ratio::percentage(
                Decimal::from(customers),
                Decimal::from(profiles.len()),
            ),
        })
        .collect()
}
