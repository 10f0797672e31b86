use crate::enums::Column;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Schema error: column '{0}' is missing from the source")]
    MissingColumn(Column),
}
