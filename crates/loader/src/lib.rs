//! # Retail Insights Loader
//!
//! Reads a transaction ledger from CSV, coerces it into the `Transaction`
//! schema and builds the `WorkingTable` the analytics engine consumes.
//! Malformed, inconsistent and duplicate rows are dropped and accounted for
//! in a `LoadReport`; the analytics crate never sees them.

pub mod error;
pub mod reader;
pub mod report;

pub use error::LoaderError;
pub use reader::{LoadOutcome, load_csv, load_from_reader};
pub use report::{DropReason, LoadReport};
