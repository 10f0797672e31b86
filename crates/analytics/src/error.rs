use core_types::CoreError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalyticsError {
    #[error(transparent)]
    Schema(#[from] CoreError),

    #[error("Invalid analysis parameter: {0}")]
    InvalidParameter(String),
}
