//! # Retail Insights Analytics Engine
//!
//! This crate turns a cleaned retail ledger into ranked, segmented and
//! time-bucketed business summaries.
//!
//! ## Architectural Principles
//!
//! - **Layer 1 Logic:** This is a pure logic crate. It performs no I/O and has no
//!   knowledge of how the ledger was loaded. It depends only on `core-types` for
//!   the `WorkingTable` and on `configuration` for its parameters.
//! - **Stateless Calculation:** Every analysis takes `&WorkingTable` and returns
//!   owned, serializable results. Identical input always yields identical output.
//! - **Explicit Degeneracy:** Metrics that divide by a possibly-zero quantity are
//!   `Ratio`s, and thin or empty data is reported through `AnalysisWarning`s
//!   attached to the result rather than through errors.
//!
//! ## Public API
//!
//! - `InsightEngine`: The facade that runs every analysis into an `InsightReport`.
//! - `rank_by` / `rank_where`: The group-by-rank primitive.
//! - `segment_customers`, `compare_promotion`, `seasonal_trends`, `describe`:
//!   The individual analyses, each also available as a configurable struct.
//! - `AnalyticsError`: The specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod aggregator;
pub mod descriptive;
pub mod engine;
pub mod error;
pub mod metric;
pub mod promotion;
pub mod quantile;
pub mod report;
pub mod seasonal;
pub mod segmenter;
pub mod warning;

#[cfg(test)]
mod test_support;

// Re-export the key components to create a clean, public-facing API.
pub use aggregator::{DEFAULT_TOP_N, EntityKey, GroupKey, RankMetric, RankedEntity, rank_by, rank_where};
pub use descriptive::{DescriptiveStats, NumericSummary, describe};
pub use engine::InsightEngine;
pub use error::AnalyticsError;
pub use metric::Ratio;
pub use promotion::{PromotionAnalysis, PromotionComparator, compare_promotion};
pub use report::{CustomerBundle, ExplorationBundle, InsightReport, Section};
pub use seasonal::{SeasonalExtractor, SeasonalTrends, YearOverYear, seasonal_trends};
pub use segmenter::{CustomerSegmentation, Segment, Segmenter, segment_customers, segment_preferences};
pub use warning::{AnalysisWarning, Component};
