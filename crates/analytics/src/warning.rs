use serde::Serialize;
use std::fmt;

/// The analysis component a warning originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Aggregator,
    Segmenter,
    PromotionComparator,
    SeasonalExtractor,
    Descriptive,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Component::Aggregator => "aggregator",
            Component::Segmenter => "segmenter",
            Component::PromotionComparator => "promotion comparator",
            Component::SeasonalExtractor => "seasonal extractor",
            Component::Descriptive => "descriptive statistics",
        };
        f.write_str(name)
    }
}

/// A non-fatal condition attached to an analysis result.
///
/// The result it accompanies is still well-formed, but a consumer should not
/// read it as a meaningful signal without taking the warning into account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisWarning {
    /// The table had no rows; the result is explicitly empty.
    EmptyInput { component: Component },
    /// The data is too thin or lopsided for the analysis to be meaningful.
    DegenerateDistribution { component: Component, detail: String },
}

impl AnalysisWarning {
    pub(crate) fn empty_input(component: Component) -> Self {
        tracing::warn!(%component, "Analysis received an empty table.");
        AnalysisWarning::EmptyInput { component }
    }

    pub(crate) fn degenerate(component: Component, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        tracing::warn!(%component, %detail, "Degenerate distribution.");
        AnalysisWarning::DegenerateDistribution { component, detail }
    }
}

impl fmt::Display for AnalysisWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisWarning::EmptyInput { component } => {
                write!(f, "{component}: input table is empty")
            }
            AnalysisWarning::DegenerateDistribution { component, detail } => {
                write!(f, "{component}: {detail}")
            }
        }
    }
}
