use crate::error::ConfigError;
use rust_decimal::Decimal;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use settings::{AnalysisSettings, AppConfig, DataSettings, LoggingSettings};

/// The default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Loads the application configuration.
///
/// Reads `path` (or `config.toml` when `None`; a missing default file is not an
/// error), layers `RETAIL__SECTION__KEY` environment variables on top,
/// deserializes into the strongly-typed `AppConfig` and validates it.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let file = match path {
        Some(path) => config::File::from(path).required(true),
        None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    let builder = config::Config::builder()
        .add_source(file)
        .add_source(
            config::Environment::with_prefix("RETAIL")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config = builder.try_deserialize::<AppConfig>()?;
    validate(&config)?;

    tracing::debug!(?config, "Configuration loaded.");
    Ok(config)
}

/// Checks the cross-field rules serde cannot express.
pub fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    validate_analysis(&config.analysis)?;

    if config.data.amount_tolerance.is_sign_negative() {
        return Err(ConfigError::ValidationError(
            "data.amount_tolerance must not be negative".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_analysis(analysis: &AnalysisSettings) -> Result<(), ConfigError> {
    if analysis.top_n == 0 || analysis.preference_top_n == 0 {
        return Err(ConfigError::ValidationError(
            "analysis.top_n and analysis.preference_top_n must be positive".to_string(),
        ));
    }

    let lower = analysis.lower_segment_quantile;
    let upper = analysis.upper_segment_quantile;
    let in_unit = |q: Decimal| q > Decimal::ZERO && q < Decimal::ONE;
    if !in_unit(lower) || !in_unit(upper) || lower >= upper {
        return Err(ConfigError::ValidationError(format!(
            "segment quantiles must satisfy 0 < lower < upper < 1, got {lower} and {upper}"
        )));
    }

    let edges = &analysis.discount_band_edges;
    if edges.len() < 2 {
        return Err(ConfigError::ValidationError(
            "analysis.discount_band_edges needs at least two edges".to_string(),
        ));
    }
    if edges[0] != Decimal::ZERO || edges[edges.len() - 1] > Decimal::ONE_HUNDRED {
        return Err(ConfigError::ValidationError(
            "analysis.discount_band_edges must start at 0 and end at or below 100".to_string(),
        ));
    }
    if edges.windows(2).any(|w| w[0] >= w[1]) {
        return Err(ConfigError::ValidationError(
            "analysis.discount_band_edges must be strictly increasing".to_string(),
        ));
    }

    Ok(())
}
