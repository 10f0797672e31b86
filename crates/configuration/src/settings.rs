use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::PathBuf;

/// The root configuration structure for the entire application.
///
/// Every section is optional in the file; a missing section falls back to
/// its `Default` implementation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data: DataSettings,
    pub analysis: AnalysisSettings,
    pub logging: LoggingSettings,
}

/// Settings for the CSV loading and cleaning layer.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    /// Default ledger location, used when no `--input` is given on the command line.
    pub input_path: Option<PathBuf>,
    /// Field delimiter of the CSV file.
    pub delimiter: char,
    /// Maximum absolute difference tolerated between `total_amount` and
    /// `quantity * unit_price * (1 - discount_pct / 100)`.
    pub amount_tolerance: Decimal,
}

/// Parameters of the analytical engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Number of rows kept by ranking analyses (top products, top cities, ...).
    pub top_n: usize,
    /// Number of rows kept by the per-segment and per-season preference lists.
    pub preference_top_n: usize,
    /// Lower cut point of the customer segmentation, as a fraction (0.33 = 33rd percentile).
    pub lower_segment_quantile: Decimal,
    /// Upper cut point of the customer segmentation.
    pub upper_segment_quantile: Decimal,
    /// Edges of the discount bands, in percent. Consecutive edges form
    /// left-open, right-closed bands: `[0, 10, 20]` yields `(0,10]` and `(10,20]`.
    pub discount_band_edges: Vec<Decimal>,
}

/// Settings for the `tracing` subscriber.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter directive used when `RUST_LOG` is not set (e.g. "info,analytics=debug").
    pub filter: String,
    /// Optional directory for a daily-rotated log file, in addition to stderr.
    pub directory: Option<PathBuf>,
}

// --- Default Implementations ---
// These allow a user to omit any section from their toml
// and still have it work with sensible defaults.

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            input_path: None,
            delimiter: ',',
            amount_tolerance: dec!(0.05),
        }
    }
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            top_n: 10,
            preference_top_n: 5,
            lower_segment_quantile: dec!(0.33),
            upper_segment_quantile: dec!(0.67),
            discount_band_edges: vec![dec!(0), dec!(10), dec!(20), dec!(30), dec!(50), dec!(100)],
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            directory: None,
        }
    }
}
