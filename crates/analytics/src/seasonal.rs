//! Calendar-keyed bucketing of the ledger.
//!
//! Buckets are emitted in calendar order (January first, Monday first)
//! whatever the order of the rows. Only observed periods produce a bucket;
//! the month by weekday heatmap is the one dense, zero-filled output.

use crate::aggregator::{GroupKey, RankMetric, RankedEntity, rank_where};
use crate::error::AnalyticsError;
use crate::metric::Ratio;
use crate::warning::{AnalysisWarning, Component};
use chrono::Weekday;
use configuration::AnalysisSettings;
use core_types::{Column, TransactionRow, WorkingTable};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// The calendar period a bucket covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PeriodKey {
    /// 1-12.
    Month(u32),
    /// 1-4.
    Quarter(u32),
    DayOfWeek(Weekday),
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodKey::Month(m) => {
                let name = (*m as usize)
                    .checked_sub(1)
                    .and_then(|i| MONTH_NAMES.get(i))
                    .copied()
                    .unwrap_or("Unknown");
                f.write_str(name)
            }
            PeriodKey::Quarter(q) => write!(f, "Q{q}"),
            PeriodKey::DayOfWeek(day) => write!(f, "{day}"),
        }
    }
}

/// Quarter-based seasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

impl Season {
    pub const ALL: [Season; 4] = [Season::Winter, Season::Spring, Season::Summer, Season::Fall];

    pub fn quarter(&self) -> u32 {
        match self {
            Season::Winter => 1,
            Season::Spring => 2,
            Season::Summer => 3,
            Season::Fall => 4,
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Season::Winter => "Winter",
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Fall => "Fall",
        };
        write!(f, "{name} (Q{})", self.quarter())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeasonalBucket {
    pub period: PeriodKey,
    pub total_revenue: Decimal,
    pub transaction_count: usize,
    pub avg_transaction_value: Ratio,
    pub total_quantity: u64,
    pub unique_customers: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HeatmapCell {
    pub revenue: Decimal,
    pub transaction_count: usize,
}

/// Month by weekday pivot: rows January..December, columns Monday..Sunday.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Heatmap {
    pub cells: [[HeatmapCell; 7]; 12],
}

impl Heatmap {
    /// `month` is 1-based. Returns `None` outside 1-12.
    pub fn cell(&self, month: u32, day: Weekday) -> Option<HeatmapCell> {
        let row = self.cells.get((month as usize).checked_sub(1)?)?;
        Some(row[day.num_days_from_monday() as usize])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearTotals {
    pub year: i32,
    pub total_revenue: Decimal,
    pub transaction_count: usize,
    pub unique_customers: usize,
}

/// Growth between two consecutive observed years, in percent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearGrowth {
    pub from_year: i32,
    pub to_year: i32,
    pub revenue_growth_pct: Ratio,
    pub transaction_growth_pct: Ratio,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearRevenue {
    pub year: i32,
    pub revenue: Decimal,
}

/// Revenue of one calendar month in each observed year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthAcrossYears {
    pub month: u32,
    pub revenue_by_year: Vec<YearRevenue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum YearOverYear {
    /// Fewer than two distinct years in the data.
    NotApplicable { distinct_years: usize },
    Comparison {
        years: Vec<YearTotals>,
        growth: Vec<YearGrowth>,
        monthly: Vec<MonthAcrossYears>,
    },
}

impl YearOverYear {
    pub fn is_applicable(&self) -> bool {
        matches!(self, YearOverYear::Comparison { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeasonalProducts {
    pub season: Season,
    pub products: Vec<RankedEntity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeasonalTrends {
    pub monthly: Vec<SeasonalBucket>,
    pub quarterly: Vec<SeasonalBucket>,
    pub day_of_week: Vec<SeasonalBucket>,
    pub heatmap: Heatmap,
    pub year_over_year: YearOverYear,
    /// Month with the highest revenue; the earliest month wins a tie.
    pub peak_month: Option<PeriodKey>,
    /// Weekday with the most transactions; the earliest weekday wins a tie.
    pub busiest_day: Option<PeriodKey>,
    /// Only seasons with at least one transaction are listed.
    pub seasonal_products: Vec<SeasonalProducts>,
    pub warnings: Vec<AnalysisWarning>,
}

#[derive(Default)]
struct BucketTotals<'a> {
    revenue: Decimal,
    transactions: usize,
    quantity: u64,
    customers: BTreeSet<&'a str>,
}

impl<'a> BucketTotals<'a> {
    fn add(&mut self, row: &'a TransactionRow) {
        self.revenue += row.record.total_amount;
        self.transactions += 1;
        self.quantity += u64::from(row.record.quantity);
        self.customers.insert(row.record.customer_id.as_str());
    }

    fn bucket(&self, period: PeriodKey) -> Option<SeasonalBucket> {
        (self.transactions > 0).then(|| SeasonalBucket {
            period,
            total_revenue: self.revenue,
            transaction_count: self.transactions,
            avg_transaction_value: Ratio::mean(self.revenue, self.transactions),
            total_quantity: self.quantity,
            unique_customers: self.customers.len(),
        })
    }
}

/// Extracts seasonal patterns from a working table.
#[derive(Debug, Clone)]
pub struct SeasonalExtractor {
    top_n: usize,
}

impl Default for SeasonalExtractor {
    fn default() -> Self {
        Self::from_settings(&AnalysisSettings::default())
    }
}

impl SeasonalExtractor {
    /// `top_n` bounds the product list of each season.
    pub fn new(top_n: usize) -> Self {
        Self { top_n }
    }

    pub fn from_settings(settings: &AnalysisSettings) -> Self {
        Self::new(settings.preference_top_n)
    }

    pub fn extract(&self, table: &WorkingTable) -> Result<SeasonalTrends, AnalyticsError> {
        table.require(&[
            Column::TransactionDate,
            Column::TotalAmount,
            Column::Quantity,
            Column::CustomerId,
            Column::ProductId,
        ])?;

        let mut warnings = Vec::new();
        if table.is_empty() {
            warnings.push(AnalysisWarning::empty_input(Component::SeasonalExtractor));
        }

        let mut months: [BucketTotals; 12] = std::array::from_fn(|_| BucketTotals::default());
        let mut quarters: [BucketTotals; 4] = std::array::from_fn(|_| BucketTotals::default());
        let mut days: [BucketTotals; 7] = std::array::from_fn(|_| BucketTotals::default());
        let mut heatmap = Heatmap::default();

        for row in table.rows() {
            let derived = &row.derived;
            let month = (derived.month as usize).saturating_sub(1).min(11);
            let quarter = (derived.quarter as usize).saturating_sub(1).min(3);
            let day = derived.day_of_week.num_days_from_monday() as usize;

            months[month].add(row);
            quarters[quarter].add(row);
            days[day].add(row);

            let cell = &mut heatmap.cells[month][day];
            cell.revenue += row.record.total_amount;
            cell.transaction_count += 1;
        }

        let monthly: Vec<SeasonalBucket> = months
            .iter()
            .zip(1u32..)
            .filter_map(|(totals, m)| totals.bucket(PeriodKey::Month(m)))
            .collect();
        let quarterly: Vec<SeasonalBucket> = quarters
            .iter()
            .zip(1u32..)
            .filter_map(|(totals, q)| totals.bucket(PeriodKey::Quarter(q)))
            .collect();
        let day_of_week: Vec<SeasonalBucket> = days
            .iter()
            .zip(WEEKDAYS)
            .filter_map(|(totals, day)| totals.bucket(PeriodKey::DayOfWeek(day)))
            .collect();

        let peak_month = first_max_by(&monthly, |b| b.total_revenue);
        let busiest_day = first_max_by(&day_of_week, |b| b.transaction_count);

        let year_over_year = year_over_year(table.rows());
        if let YearOverYear::NotApplicable { distinct_years } = year_over_year {
            tracing::debug!(distinct_years, "Year-over-year comparison not applicable.");
        }

        let seasonal_products = self.seasonal_products(table)?;

        tracing::debug!(
            months = monthly.len(),
            quarters = quarterly.len(),
            weekdays = day_of_week.len(),
            "Seasonal buckets extracted."
        );

        Ok(SeasonalTrends {
            monthly,
            quarterly,
            day_of_week,
            heatmap,
            year_over_year,
            peak_month,
            busiest_day,
            seasonal_products,
            warnings,
        })
    }

    fn seasonal_products(
        &self,
        table: &WorkingTable,
    ) -> Result<Vec<SeasonalProducts>, AnalyticsError> {
        let mut seasons = Vec::new();
        for season in Season::ALL {
            let quarter = season.quarter();
            let products = rank_where(
                table,
                GroupKey::ProductId,
                &[RankMetric::TotalRevenue, RankMetric::TotalQuantity],
                self.top_n,
                |row| row.derived.quarter == quarter,
            )?;
            if !products.is_empty() {
                seasons.push(SeasonalProducts { season, products });
            }
        }
        Ok(seasons)
    }
}

/// Runs the extractor with default settings.
pub fn seasonal_trends(table: &WorkingTable) -> Result<SeasonalTrends, AnalyticsError> {
    SeasonalExtractor::default().extract(table)
}

fn first_max_by<K, F>(buckets: &[SeasonalBucket], key: F) -> Option<PeriodKey>
where
    K: Ord,
    F: Fn(&SeasonalBucket) -> K,
{
    let mut best: Option<&SeasonalBucket> = None;
    for bucket in buckets {
        if best.is_none_or(|b| key(bucket) > key(b)) {
            best = Some(bucket);
        }
    }
    best.map(|b| b.period)
}

fn year_over_year(rows: &[TransactionRow]) -> YearOverYear {
    let mut per_year: BTreeMap<i32, BucketTotals> = BTreeMap::new();
    let mut per_month: BTreeMap<(u32, i32), Decimal> = BTreeMap::new();

    for row in rows {
        per_year.entry(row.derived.year).or_default().add(row);
        *per_month
            .entry((row.derived.month, row.derived.year))
            .or_default() += row.record.total_amount;
    }

    if per_year.len() < 2 {
        return YearOverYear::NotApplicable {
            distinct_years: per_year.len(),
        };
    }

    let years: Vec<YearTotals> = per_year
        .iter()
        .map(|(year, totals)| YearTotals {
            year: *year,
            total_revenue: totals.revenue,
            transaction_count: totals.transactions,
            unique_customers: totals.customers.len(),
        })
        .collect();

    let growth = years
        .windows(2)
        .map(|w| YearGrowth {
            from_year: w[0].year,
            to_year: w[1].year,
            revenue_growth_pct: Ratio::percentage(
                w[1].total_revenue - w[0].total_revenue,
                w[0].total_revenue,
            ),
            transaction_growth_pct: Ratio::percentage(
                Decimal::from(w[1].transaction_count) - Decimal::from(w[0].transaction_count),
                Decimal::from(w[0].transaction_count),
            ),
        })
        .collect();

    let observed_months: BTreeSet<u32> = per_month.keys().map(|(month, _)| *month).collect();
    let monthly = observed_months
        .into_iter()
        .map(|month| MonthAcrossYears {
            month,
            revenue_by_year: per_year
                .keys()
                .map(|year| YearRevenue {
                    year: *year,
                    revenue: per_month.get(&(month, *year)).copied().unwrap_or_default(),
                })
                .collect(),
        })
        .collect();

    YearOverYear::Comparison {
        years,
        growth,
        monthly,
    }
}
