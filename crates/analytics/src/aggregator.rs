//! Group-by-rank primitive shared by the product, city, category and
//! store-type analyses.

use crate::error::AnalyticsError;
use crate::metric::Ratio;
use core_types::{Column, Transaction, TransactionRow, WorkingTable};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_TOP_N: usize = 10;

/// The column a ranking groups on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKey {
    ProductId,
    ProductName,
    Category,
    City,
    StoreType,
    PaymentMethod,
    CustomerId,
}

impl GroupKey {
    pub fn column(&self) -> Column {
        match self {
            GroupKey::ProductId => Column::ProductId,
            GroupKey::ProductName => Column::ProductName,
            GroupKey::Category => Column::Category,
            GroupKey::City => Column::City,
            GroupKey::StoreType => Column::StoreType,
            GroupKey::PaymentMethod => Column::PaymentMethod,
            GroupKey::CustomerId => Column::CustomerId,
        }
    }

    pub(crate) fn value<'a>(&self, record: &'a Transaction) -> Option<&'a str> {
        match self {
            GroupKey::ProductId => Some(record.product_id.as_str()),
            GroupKey::ProductName => record.product_name.as_deref(),
            GroupKey::Category => record.category.as_deref(),
            GroupKey::City => record.city.as_deref(),
            GroupKey::StoreType => record.store_type.as_deref(),
            GroupKey::PaymentMethod => record.payment_method.as_deref(),
            GroupKey::CustomerId => Some(record.customer_id.as_str()),
        }
    }
}

impl FromStr for GroupKey {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "product" | "product_id" => Ok(GroupKey::ProductId),
            "product_name" => Ok(GroupKey::ProductName),
            "category" => Ok(GroupKey::Category),
            "city" => Ok(GroupKey::City),
            "store" | "store_type" => Ok(GroupKey::StoreType),
            "payment" | "payment_method" => Ok(GroupKey::PaymentMethod),
            "customer" | "customer_id" => Ok(GroupKey::CustomerId),
            other => Err(AnalyticsError::InvalidParameter(format!(
                "unknown group key '{other}'"
            ))),
        }
    }
}

/// A numeric reduction a ranking can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankMetric {
    /// `sum(quantity)`
    TotalQuantity,
    /// `sum(total_amount)`
    TotalRevenue,
    /// `mean(unit_price)`
    AvgPrice,
    /// `count(transaction_id)`
    TransactionCount,
}

impl FromStr for RankMetric {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "quantity" | "total_quantity" => Ok(RankMetric::TotalQuantity),
            "revenue" | "total_revenue" => Ok(RankMetric::TotalRevenue),
            "price" | "avg_price" => Ok(RankMetric::AvgPrice),
            "count" | "transactions" | "transaction_count" => Ok(RankMetric::TransactionCount),
            other => Err(AnalyticsError::InvalidParameter(format!(
                "unknown rank metric '{other}'"
            ))),
        }
    }
}

/// The value a group is keyed by.
///
/// Rows with no value in the grouping column are not dropped: they form the
/// `Missing` group, which can never be confused with a category that happens
/// to be named "Missing". `Missing` sorts after every named key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKey {
    Named(String),
    Missing,
}

impl EntityKey {
    pub fn is_missing(&self) -> bool {
        matches!(self, EntityKey::Missing)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Named(name) => f.write_str(name),
            EntityKey::Missing => f.write_str("(missing)"),
        }
    }
}

/// The 1-based position of a group in the ordering led by `metric`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricRank {
    pub metric: RankMetric,
    pub rank: usize,
}

/// One aggregated group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedEntity {
    pub key: EntityKey,
    /// Human-readable name for product-id groups (the smallest product name
    /// seen for the id), `None` otherwise.
    pub label: Option<String>,
    pub total_quantity: u64,
    pub total_revenue: Decimal,
    pub avg_price: Decimal,
    pub transaction_count: usize,
    pub unique_customers: usize,
    /// Share of this group's revenue in the revenue of all ranked rows.
    pub revenue_share_pct: Ratio,
    /// One entry per requested metric, in request order.
    pub ranks: Vec<MetricRank>,
}

impl RankedEntity {
    pub fn metric(&self, metric: RankMetric) -> Decimal {
        match metric {
            RankMetric::TotalQuantity => Decimal::from(self.total_quantity),
            RankMetric::TotalRevenue => self.total_revenue,
            RankMetric::AvgPrice => self.avg_price,
            RankMetric::TransactionCount => Decimal::from(self.transaction_count),
        }
    }

    pub fn rank_for(&self, metric: RankMetric) -> Option<usize> {
        self.ranks.iter().find(|r| r.metric == metric).map(|r| r.rank)
    }
}

#[derive(Default)]
struct GroupAccumulator<'a> {
    total_quantity: u64,
    total_revenue: Decimal,
    price_sum: Decimal,
    transaction_count: usize,
    customers: BTreeSet<&'a str>,
    label: Option<&'a str>,
}

/// Groups the whole table by `group_key` and returns the `top_n` groups
/// ordered by `metrics`.
///
/// The output is sorted descending by the first metric. Ties are broken by
/// the second requested metric descending, then by any further metrics, then
/// by key ascending, so the order is total and reproducible. An empty table
/// yields an empty vector.
pub fn rank_by(
    table: &WorkingTable,
    group_key: GroupKey,
    metrics: &[RankMetric],
    top_n: usize,
) -> Result<Vec<RankedEntity>, AnalyticsError> {
    rank_where(table, group_key, metrics, top_n, |_| true)
}

/// Same as [`rank_by`], restricted to the rows accepted by `filter`.
pub fn rank_where<F>(
    table: &WorkingTable,
    group_key: GroupKey,
    metrics: &[RankMetric],
    top_n: usize,
    filter: F,
) -> Result<Vec<RankedEntity>, AnalyticsError>
where
    F: Fn(&TransactionRow) -> bool,
{
    if top_n == 0 {
        return Err(AnalyticsError::InvalidParameter(
            "top_n must be positive".to_string(),
        ));
    }
    let metrics = dedup_metrics(metrics);
    if metrics.is_empty() {
        return Err(AnalyticsError::InvalidParameter(
            "at least one rank metric is required".to_string(),
        ));
    }
    table.require(&[group_key.column()])?;

    let mut groups: BTreeMap<EntityKey, GroupAccumulator<'_>> = BTreeMap::new();
    let mut ranked_revenue = Decimal::ZERO;

    for row in table.rows().iter().filter(|row| filter(row)) {
        let record = &row.record;
        let key = match group_key.value(record) {
            Some(value) => EntityKey::Named(value.to_string()),
            None => EntityKey::Missing,
        };
        let group = groups.entry(key).or_default();

        group.total_quantity += u64::from(record.quantity);
        group.total_revenue += record.total_amount;
        group.price_sum += record.unit_price;
        group.transaction_count += 1;
        group.customers.insert(record.customer_id.as_str());
        if group_key == GroupKey::ProductId {
            if let Some(name) = record.product_name.as_deref() {
                group.label = Some(group.label.map_or(name, |current| current.min(name)));
            }
        }
        ranked_revenue += record.total_amount;
    }

    let mut entities: Vec<RankedEntity> = groups
        .into_iter()
        .map(|(key, group)| RankedEntity {
            key,
            label: group.label.map(str::to_string),
            total_quantity: group.total_quantity,
            total_revenue: group.total_revenue,
            avg_price: group.price_sum / Decimal::from(group.transaction_count),
            transaction_count: group.transaction_count,
            unique_customers: group.customers.len(),
            revenue_share_pct: Ratio::percentage(group.total_revenue, ranked_revenue),
            ranks: Vec::with_capacity(metrics.len()),
        })
        .collect();

    // Assign a rank for every requested metric, each in the ordering led by
    // that metric and tie-broken by the others in request order.
    for (position, metric) in metrics.iter().enumerate() {
        let mut order = Vec::with_capacity(metrics.len());
        order.push(*metric);
        order.extend(metrics.iter().enumerate().filter(|(i, _)| *i != position).map(|(_, m)| *m));

        let mut indices: Vec<usize> = (0..entities.len()).collect();
        indices.sort_by(|&a, &b| compare(&entities[a], &entities[b], &order));
        for (rank, index) in indices.into_iter().enumerate() {
            entities[index].ranks.push(MetricRank {
                metric: *metric,
                rank: rank + 1,
            });
        }
    }

    entities.sort_by(|a, b| compare(a, b, &metrics));
    entities.truncate(top_n);

    tracing::debug!(?group_key, ?metrics, returned = entities.len(), "Ranking computed.");
    Ok(entities)
}

fn dedup_metrics(metrics: &[RankMetric]) -> Vec<RankMetric> {
    let mut unique = Vec::with_capacity(metrics.len());
    for metric in metrics {
        if !unique.contains(metric) {
            unique.push(*metric);
        }
    }
    unique
}

/// Descending by each metric in `order`, then ascending by key.
fn compare(a: &RankedEntity, b: &RankedEntity, order: &[RankMetric]) -> Ordering {
    order
        .iter()
        .map(|m| b.metric(*m).cmp(&a.metric(*m)))
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.key.cmp(&b.key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{table, tx};
    use core_types::{CoreError, Schema};
    use rust_decimal_macros::dec;

    const REVENUE_THEN_COUNT: &[RankMetric] =
        &[RankMetric::TotalRevenue, RankMetric::TransactionCount];

    #[test]
    fn respects_top_n_and_group_count() {
        let t = table(vec![
            tx("T1", "A", dec!(10)).product("P1"),
            tx("T2", "A", dec!(20)).product("P2"),
            tx("T3", "B", dec!(30)).product("P3"),
        ]);

        let top2 = rank_by(&t, GroupKey::ProductId, REVENUE_THEN_COUNT, 2).unwrap();
        assert_eq!(top2.len(), 2);

        let all = rank_by(&t, GroupKey::ProductId, REVENUE_THEN_COUNT, 10).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].total_revenue >= w[1].total_revenue));
    }

    #[test]
    fn aggregates_each_metric() {
        let t = table(vec![
            tx("T1", "A", dec!(30)).product("P1").quantity(3),
            tx("T2", "B", dec!(10)).product("P1"),
            tx("T3", "B", dec!(5)).product("P2"),
        ]);

        let ranked = rank_by(&t, GroupKey::ProductId, &[RankMetric::TotalRevenue], 10).unwrap();
        let p1 = &ranked[0];
        assert_eq!(p1.key, EntityKey::Named("P1".to_string()));
        assert_eq!(p1.label.as_deref(), Some("Name of P1"));
        assert_eq!(p1.total_quantity, 4);
        assert_eq!(p1.total_revenue, dec!(40));
        assert_eq!(p1.avg_price, dec!(10));
        assert_eq!(p1.transaction_count, 2);
        assert_eq!(p1.unique_customers, 2);
        assert_eq!(p1.revenue_share_pct.round_dp(2), Ratio::Value(dec!(88.89)));
    }

    #[test]
    fn ties_break_on_second_metric_then_key() {
        let t = table(vec![
            // P2 and P3 tie on revenue; P3 has more transactions.
            tx("T1", "A", dec!(50)).product("P2"),
            tx("T2", "A", dec!(25)).product("P3"),
            tx("T3", "A", dec!(25)).product("P3"),
            // P4 and P5 tie on both; key decides.
            tx("T4", "A", dec!(10)).product("P5"),
            tx("T5", "A", dec!(10)).product("P4"),
        ]);

        let ranked = rank_by(&t, GroupKey::ProductId, REVENUE_THEN_COUNT, 10).unwrap();
        let keys: Vec<String> = ranked.iter().map(|e| e.key.to_string()).collect();
        assert_eq!(keys, ["P3", "P2", "P4", "P5"]);
    }

    #[test]
    fn ranks_each_requested_metric() {
        let t = table(vec![
            tx("T1", "A", dec!(100)).product("P1"),
            tx("T2", "A", dec!(10)).product("P2"),
            tx("T3", "A", dec!(10)).product("P2"),
            tx("T4", "A", dec!(10)).product("P2"),
        ]);

        let ranked = rank_by(&t, GroupKey::ProductId, REVENUE_THEN_COUNT, 10).unwrap();
        assert_eq!(ranked[0].key.to_string(), "P1");
        assert_eq!(ranked[0].rank_for(RankMetric::TotalRevenue), Some(1));
        assert_eq!(ranked[0].rank_for(RankMetric::TransactionCount), Some(2));
        assert_eq!(ranked[1].rank_for(RankMetric::TransactionCount), Some(1));
        assert_eq!(ranked[1].rank_for(RankMetric::AvgPrice), None);
    }

    #[test]
    fn null_keys_form_their_own_group() {
        let t = table(vec![
            tx("T1", "A", dec!(10)).city(Some("Missing")),
            tx("T2", "B", dec!(10)).city(None),
            tx("T3", "C", dec!(10)).city(None),
        ]);

        let ranked = rank_by(&t, GroupKey::City, &[RankMetric::TotalRevenue], 10).unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].key, EntityKey::Missing);
        assert_eq!(ranked[0].total_revenue, dec!(20));
        assert_eq!(ranked[1].key, EntityKey::Named("Missing".to_string()));
        assert_eq!(ranked[0].key.to_string(), "(missing)");
        assert!(ranked[0].key.is_missing());
        assert!(!ranked[1].key.is_missing());
    }

    #[test]
    fn missing_key_serializes_apart_from_named() {
        let keys = [EntityKey::Missing, EntityKey::Named("Missing".to_string())];
        let json = serde_json::to_string(&keys).unwrap();

        assert_eq!(json, r#"["missing",{"named":"Missing"}]"#);
    }

    #[test]
    fn empty_table_yields_empty_ranking() {
        let t = table(Vec::new());
        let ranked = rank_by(&t, GroupKey::City, REVENUE_THEN_COUNT, DEFAULT_TOP_N).unwrap();
        assert!(ranked.is_empty());
    }

    #[test]
    fn rejects_bad_parameters() {
        let t = table(vec![tx("T1", "A", dec!(10))]);
        assert!(matches!(
            rank_by(&t, GroupKey::City, &[], 10),
            Err(AnalyticsError::InvalidParameter(_))
        ));
        assert!(matches!(
            rank_by(&t, GroupKey::City, REVENUE_THEN_COUNT, 0),
            Err(AnalyticsError::InvalidParameter(_))
        ));
    }

    #[test]
    fn missing_group_column_is_a_schema_error() {
        let schema = Schema::new(Column::ALL.into_iter().filter(|c| *c != Column::City));
        let t = WorkingTable::new(schema, vec![tx("T1", "A", dec!(10)).build()]).unwrap();

        assert_eq!(
            rank_by(&t, GroupKey::City, REVENUE_THEN_COUNT, 10),
            Err(AnalyticsError::Schema(CoreError::MissingColumn(Column::City)))
        );
    }

    #[test]
    fn filter_restricts_rows() {
        let t = table(vec![
            tx("T1", "A", dec!(10)).product("P1"),
            tx("T2", "B", dec!(20)).product("P2").discount(dec!(5)),
        ]);

        let ranked = rank_where(&t, GroupKey::ProductId, &[RankMetric::TotalRevenue], 10, |row| {
            row.derived.has_discount
        })
        .unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].key.to_string(), "P2");
        assert_eq!(ranked[0].revenue_share_pct, Ratio::Value(dec!(100)));
    }

    #[test]
    fn parses_keys_and_metrics() {
        assert_eq!("store-type".parse::<GroupKey>().unwrap(), GroupKey::StoreType);
        assert_eq!("revenue".parse::<RankMetric>().unwrap(), RankMetric::TotalRevenue);
        assert!("volume".parse::<RankMetric>().is_err());
    }
}
