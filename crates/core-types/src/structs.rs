use chrono::{Datelike, NaiveDate, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single line of the retail ledger, as handed over by the loading layer.
///
/// The loader guarantees that `total_amount` agrees with
/// `quantity * unit_price * (1 - discount_pct / 100)` within its tolerance.
/// Nothing downstream re-derives prices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    pub customer_id: String,
    pub product_id: String,

    // Descriptive fields. `None` means the source had no value for this row.
    pub product_name: Option<String>,
    pub category: Option<String>,
    pub store_type: Option<String>,
    pub city: Option<String>,
    pub payment_method: Option<String>,

    pub quantity: u32,
    pub unit_price: Decimal,
    /// Amount actually charged, after discount.
    pub total_amount: Decimal,
    /// Discount percentage in the 0-100 range.
    pub discount_pct: Decimal,

    pub transaction_date: NaiveDate,
}

/// Per-row fields computed once when a working table is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedFields {
    pub year: i32,
    /// Calendar month, 1-12.
    pub month: u32,
    pub day_of_week: Weekday,
    /// Calendar quarter, 1-4.
    pub quarter: u32,
    pub has_discount: bool,
    /// Amount after discount.
    pub net_amount: Decimal,
    /// List price of the line, `quantity * unit_price`.
    pub gross_amount: Decimal,
    /// `gross_amount - net_amount`, never negative.
    pub discount_amount: Decimal,
}

impl DerivedFields {
    pub fn derive(transaction: &Transaction) -> Self {
        let date = transaction.transaction_date;
        let month = date.month();
        let net_amount = transaction.total_amount;
        let gross_amount = Decimal::from(transaction.quantity) * transaction.unit_price;
        let discount_amount = (gross_amount - net_amount).max(Decimal::ZERO);

        Self {
            year: date.year(),
            month,
            day_of_week: date.weekday(),
            quarter: (month - 1) / 3 + 1,
            has_discount: transaction.discount_pct > Decimal::ZERO,
            net_amount,
            gross_amount,
            discount_amount,
        }
    }
}

/// A transaction together with its derived fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRow {
    pub record: Transaction,
    pub derived: DerivedFields,
}

impl TransactionRow {
    pub fn new(record: Transaction) -> Self {
        let derived = DerivedFields::derive(&record);
        Self { record, derived }
    }
}
