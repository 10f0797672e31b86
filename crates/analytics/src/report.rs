use crate::aggregator::RankedEntity;
use crate::descriptive::DescriptiveStats;
use crate::error::AnalyticsError;
use crate::promotion::PromotionAnalysis;
use crate::seasonal::SeasonalTrends;
use crate::segmenter::{CustomerSegmentation, SegmentPreference};
use crate::warning::AnalysisWarning;
use serde::Serialize;

/// The outcome of one analysis section.
///
/// A section that fails (for example because a column it groups on is
/// absent) does not abort the other sections; the reason is kept instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum Section<T> {
    Completed(T),
    Failed { reason: String },
}

impl<T> Section<T> {
    /// Wraps an analysis result, logging a failure under the section's name.
    pub fn from_result(name: &str, result: Result<T, AnalyticsError>) -> Self {
        match result {
            Ok(bundle) => Section::Completed(bundle),
            Err(e) => {
                tracing::error!(section = name, error = %e, "Analysis section failed.");
                Section::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    pub fn completed(&self) -> Option<&T> {
        match self {
            Section::Completed(bundle) => Some(bundle),
            Section::Failed { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            Section::Completed(_) => None,
            Section::Failed { reason } => Some(reason),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Section::Failed { .. })
    }
}

/// Overview of the ledger: column summaries and the headline rankings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplorationBundle {
    pub descriptive: DescriptiveStats,
    /// Ranked by quantity sold, then revenue.
    pub top_products_by_quantity: Section<Vec<RankedEntity>>,
    /// Ranked by revenue, then quantity sold.
    pub top_products_by_revenue: Section<Vec<RankedEntity>>,
    pub top_cities: Section<Vec<RankedEntity>>,
    pub top_categories: Section<Vec<RankedEntity>>,
    pub store_types: Section<Vec<RankedEntity>>,
    pub payment_methods: Section<Vec<RankedEntity>>,
    pub warnings: Vec<AnalysisWarning>,
}

impl ExplorationBundle {
    /// The rankings under their paths in the report.
    pub fn rankings(&self) -> [(&'static str, &Section<Vec<RankedEntity>>); 6] {
        [
            ("exploration.top_products_by_quantity", &self.top_products_by_quantity),
            ("exploration.top_products_by_revenue", &self.top_products_by_revenue),
            ("exploration.top_cities", &self.top_cities),
            ("exploration.top_categories", &self.top_categories),
            ("exploration.store_types", &self.store_types),
            ("exploration.payment_methods", &self.payment_methods),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerBundle {
    pub segmentation: CustomerSegmentation,
    /// Fails on its own when the ledger has no `category` column.
    pub preferences: Section<Vec<SegmentPreference>>,
    pub top_customers: Vec<RankedEntity>,
}

/// The four analysis bundles produced by one run of the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsightReport {
    pub exploration: Section<ExplorationBundle>,
    pub customer: Section<CustomerBundle>,
    pub promotion: Section<PromotionAnalysis>,
    pub seasonal: Section<SeasonalTrends>,
}

impl InsightReport {
    /// Names and failure reasons of the sections that did not complete,
    /// including the rankings and preferences inside completed bundles
    /// (named `exploration.top_cities`, `customer.preferences` and so on).
    pub fn failed_sections(&self) -> Vec<(&'static str, &str)> {
        let mut failed = vec![("exploration", self.exploration.failure())];
        if let Some(bundle) = self.exploration.completed() {
            for (name, ranking) in bundle.rankings() {
                failed.push((name, ranking.failure()));
            }
        }
        failed.push(("customer", self.customer.failure()));
        if let Some(bundle) = self.customer.completed() {
            failed.push(("customer.preferences", bundle.preferences.failure()));
        }
        failed.push(("promotion", self.promotion.failure()));
        failed.push(("seasonal", self.seasonal.failure()));

        failed
            .into_iter()
            .filter_map(|(name, reason)| reason.map(|r| (name, r)))
            .collect()
    }

    /// Every warning attached to a completed section, in section order.
    pub fn warnings(&self) -> Vec<&AnalysisWarning> {
        let mut warnings = Vec::new();
        if let Some(bundle) = self.exploration.completed() {
            warnings.extend(&bundle.warnings);
        }
        if let Some(bundle) = self.customer.completed() {
            warnings.extend(&bundle.segmentation.warnings);
        }
        if let Some(bundle) = self.promotion.completed() {
            warnings.extend(&bundle.warnings);
        }
        if let Some(bundle) = self.seasonal.completed() {
            warnings.extend(&bundle.warnings);
        }
        warnings
    }
}
