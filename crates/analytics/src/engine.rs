use crate::aggregator::{GroupKey, RankMetric, rank_by};
use crate::descriptive::describe;
use crate::error::AnalyticsError;
use crate::promotion::{PromotionAnalysis, PromotionComparator};
use crate::report::{CustomerBundle, ExplorationBundle, InsightReport, Section};
use crate::seasonal::{SeasonalExtractor, SeasonalTrends};
use crate::segmenter::{Segmenter, segment_preferences};
use crate::warning::{AnalysisWarning, Component};
use configuration::AnalysisSettings;
use core_types::WorkingTable;

/// A stateless orchestrator that turns a working table into insight bundles.
///
/// The engine holds only its parameters. Every call reads the table through a
/// shared borrow and returns freshly computed, owned results; nothing is
/// cached between calls.
#[derive(Debug, Clone, Default)]
pub struct InsightEngine {
    settings: AnalysisSettings,
}

impl InsightEngine {
    pub fn new(settings: AnalysisSettings) -> Self {
        Self { settings }
    }

    /// The main entry point: runs the four analysis sections.
    ///
    /// # Arguments
    ///
    /// * `table` - The validated working table.
    ///
    /// # Returns
    ///
    /// An `InsightReport` in which each section either completed or carries
    /// the reason it failed. A failing section never prevents the others
    /// from running.
    #[tracing::instrument(skip_all, fields(rows = table.len()))]
    pub fn run(&self, table: &WorkingTable) -> InsightReport {
        tracing::info!("Running insight analysis.");

        let report = InsightReport {
            exploration: Section::from_result("exploration", self.explore(table)),
            customer: Section::from_result("customer", self.customers(table)),
            promotion: Section::from_result("promotion", self.promotion(table)),
            seasonal: Section::from_result("seasonal", self.seasonal(table)),
        };

        let failed = report.failed_sections();
        if failed.is_empty() {
            tracing::info!("All analysis sections completed.");
        } else {
            tracing::warn!(failed = failed.len(), "Some analysis sections failed.");
        }
        report
    }

    /// Column summaries plus the product, city, category, store-type and
    /// payment-method rankings.
    ///
    /// Each ranking is its own `Section`: a ledger without a `city` column
    /// still gets its product rankings and column summaries.
    pub fn explore(&self, table: &WorkingTable) -> Result<ExplorationBundle, AnalyticsError> {
        let top_n = self.settings.top_n;
        let by_quantity = [RankMetric::TotalQuantity, RankMetric::TotalRevenue];
        let by_revenue = [RankMetric::TotalRevenue, RankMetric::TotalQuantity];
        let by_count = [RankMetric::TransactionCount, RankMetric::TotalRevenue];
        let rank = |name: &str, key: GroupKey, metrics: &[RankMetric]| {
            Section::from_result(name, rank_by(table, key, metrics, top_n))
        };

        let mut warnings = Vec::new();
        if table.is_empty() {
            warnings.push(AnalysisWarning::empty_input(Component::Aggregator));
        }
        let descriptive = describe(table)?;
        warnings.extend(descriptive.warnings.iter().cloned());

        Ok(ExplorationBundle {
            top_products_by_quantity: rank("exploration.top_products_by_quantity", GroupKey::ProductId, &by_quantity),
            top_products_by_revenue: rank("exploration.top_products_by_revenue", GroupKey::ProductId, &by_revenue),
            top_cities: rank("exploration.top_cities", GroupKey::City, &by_revenue),
            top_categories: rank("exploration.top_categories", GroupKey::Category, &by_revenue),
            store_types: rank("exploration.store_types", GroupKey::StoreType, &by_count),
            payment_methods: rank("exploration.payment_methods", GroupKey::PaymentMethod, &by_count),
            descriptive,
            warnings,
        })
    }

    /// Value segmentation, per-segment preferences and the top spenders.
    ///
    /// Only the segmentation itself can fail the bundle. Preferences need the
    /// `category` column and fail on their own when it is absent.
    pub fn customers(&self, table: &WorkingTable) -> Result<CustomerBundle, AnalyticsError> {
        let segmentation = Segmenter::from_settings(&self.settings).segment(table)?;
        let preferences = Section::from_result(
            "customer.preferences",
            segment_preferences(table, &segmentation, self.settings.preference_top_n),
        );
        let top_customers = rank_by(
            table,
            GroupKey::CustomerId,
            &[RankMetric::TotalRevenue, RankMetric::TransactionCount],
            self.settings.top_n,
        )?;

        Ok(CustomerBundle {
            segmentation,
            preferences,
            top_customers,
        })
    }

    pub fn promotion(&self, table: &WorkingTable) -> Result<PromotionAnalysis, AnalyticsError> {
        PromotionComparator::from_settings(&self.settings).compare(table)
    }

    pub fn seasonal(&self, table: &WorkingTable) -> Result<SeasonalTrends, AnalyticsError> {
        SeasonalExtractor::from_settings(&self.settings).extract(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::Ratio;
    use crate::segmenter::Segment;
    use crate::test_support::{table, three_customers, tx};
    use core_types::{Column, Schema};
    use rust_decimal_macros::dec;

    #[test]
    fn scenario_report() {
        let report = InsightEngine::default().run(&three_customers());

        assert!(report.failed_sections().is_empty());

        let customer = report.customer.completed().unwrap();
        assert_eq!(customer.segmentation.segment_of("C"), Some(Segment::High));
        assert_eq!(customer.segmentation.segment_of("A"), Some(Segment::Medium));
        assert_eq!(customer.segmentation.segment_of("B"), Some(Segment::Low));

        let promotion = report.promotion.completed().unwrap();
        assert_eq!(
            promotion.comparison.lift.avg_transaction_value.round_dp(3),
            Ratio::Value(dec!(-0.667))
        );

        let exploration = report.exploration.completed().unwrap();
        let by_revenue = exploration.top_products_by_revenue.completed().unwrap();
        assert_eq!(by_revenue[0].key.to_string(), "P1");
    }

    #[test]
    fn runs_are_idempotent() {
        let t = three_customers();
        let engine = InsightEngine::default();
        assert_eq!(engine.run(&t), engine.run(&t));
    }

    #[test]
    fn missing_column_fails_only_its_ranking() {
        let schema = Schema::new(Column::ALL.into_iter().filter(|c| *c != Column::City));
        let transactions = vec![
            tx("T1", "A", dec!(100)).city(None).build(),
            tx("T2", "B", dec!(50)).city(None).discount(dec!(10)).build(),
        ];
        let t = WorkingTable::new(schema, transactions).unwrap();
        let report = InsightEngine::default().run(&t);

        let failed = report.failed_sections();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, "exploration.top_cities");
        assert!(failed[0].1.contains("city"));

        let exploration = report.exploration.completed().unwrap();
        assert!(exploration.top_cities.is_failed());
        assert!(!exploration.top_products_by_revenue.is_failed());
        assert_eq!(exploration.descriptive.overview.row_count, 2);
        assert!(report.customer.completed().is_some());
        assert!(report.promotion.completed().is_some());
        assert!(report.seasonal.completed().is_some());
    }

    #[test]
    fn missing_category_keeps_segmentation() {
        let schema = Schema::new(Column::ALL.into_iter().filter(|c| *c != Column::Category));
        let transactions = [("T1", "A", dec!(100)), ("T2", "B", dec!(50)), ("T3", "C", dec!(500))]
            .into_iter()
            .map(|(id, customer, total)| {
                let mut transaction = tx(id, customer, total).build();
                transaction.category = None;
                transaction
            })
            .collect();
        let t = WorkingTable::new(schema, transactions).unwrap();
        let report = InsightEngine::default().run(&t);

        let customer = report.customer.completed().unwrap();
        assert_eq!(customer.segmentation.segment_of("C"), Some(Segment::High));
        assert_eq!(customer.segmentation.segment_of("B"), Some(Segment::Low));
        assert!(customer.preferences.is_failed());
        assert_eq!(customer.top_customers[0].key.to_string(), "C");

        let failed: Vec<&str> = report.failed_sections().iter().map(|(name, _)| *name).collect();
        assert_eq!(failed, ["exploration.top_categories", "customer.preferences"]);
    }

    #[test]
    fn empty_table_completes_with_warnings() {
        let report = InsightEngine::default().run(&table(Vec::new()));

        assert!(report.failed_sections().is_empty());
        assert!(report.warnings().iter().any(|w| matches!(
            w,
            AnalysisWarning::EmptyInput { component: Component::Aggregator }
        )));
        assert!(report.warnings().iter().any(|w| matches!(
            w,
            AnalysisWarning::EmptyInput { component: Component::SeasonalExtractor }
        )));
    }

    #[test]
    fn report_serializes_undefined_metrics_explicitly() {
        let t = table(vec![
            tx("T1", "A", dec!(10)).discount(dec!(10)),
            tx("T2", "B", dec!(20)).discount(dec!(20)),
        ]);
        let report = InsightEngine::default().run(&t);
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["promotion"]["status"], "completed");
        assert_eq!(
            json["promotion"]["result"]["comparison"]["lift"]["avg_transaction_value"],
            "not_computable"
        );
    }
}
