pub mod enums;
pub mod error;
pub mod structs;
pub mod table;

// Re-export the core types to provide a clean public API.
pub use enums::Column;
pub use error::CoreError;
pub use structs::{DerivedFields, Transaction, TransactionRow};
pub use table::{Schema, WorkingTable};
