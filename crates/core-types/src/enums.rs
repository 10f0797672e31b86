use serde::{Deserialize, Serialize};
use std::fmt;

/// Every column of the transaction schema.
///
/// Identifier, numeric and date columns are required for a table to be
/// constructed at all. Descriptive columns may be absent from a source; an
/// analysis that groups on one of them checks for it explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    TransactionId,
    CustomerId,
    ProductId,
    ProductName,
    Category,
    StoreType,
    City,
    PaymentMethod,
    Quantity,
    UnitPrice,
    TotalAmount,
    DiscountPct,
    TransactionDate,
}

impl Column {
    pub const ALL: [Column; 13] = [
        Column::TransactionId,
        Column::CustomerId,
        Column::ProductId,
        Column::ProductName,
        Column::Category,
        Column::StoreType,
        Column::City,
        Column::PaymentMethod,
        Column::Quantity,
        Column::UnitPrice,
        Column::TotalAmount,
        Column::DiscountPct,
        Column::TransactionDate,
    ];

    /// The canonical snake_case name of the column.
    pub fn name(&self) -> &'static str {
        match self {
            Column::TransactionId => "transaction_id",
            Column::CustomerId => "customer_id",
            Column::ProductId => "product_id",
            Column::ProductName => "product_name",
            Column::Category => "category",
            Column::StoreType => "store_type",
            Column::City => "city",
            Column::PaymentMethod => "payment_method",
            Column::Quantity => "quantity",
            Column::UnitPrice => "unit_price",
            Column::TotalAmount => "total_amount",
            Column::DiscountPct => "discount_pct",
            Column::TransactionDate => "transaction_date",
        }
    }

    /// Returns true for columns a working table cannot be built without.
    pub fn is_required(&self) -> bool {
        !self.is_descriptive()
    }

    /// Returns true for the free-text descriptive columns, which may hold nulls.
    pub fn is_descriptive(&self) -> bool {
        matches!(
            self,
            Column::ProductName
                | Column::Category
                | Column::StoreType
                | Column::City
                | Column::PaymentMethod
        )
    }

    /// Resolves a source header to a column.
    ///
    /// Accepts the canonical snake_case names as well as the PascalCase headers
    /// used by the ledger export (`TransactionID`, `Price`, `Discount`, `Date`, ...).
    /// Matching ignores case and surrounding whitespace.
    pub fn from_header(header: &str) -> Option<Column> {
        let normalized: String = header
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != ' ')
            .flat_map(char::to_lowercase)
            .collect();

        let column = match normalized.as_str() {
            "transactionid" => Column::TransactionId,
            "customerid" => Column::CustomerId,
            "productid" => Column::ProductId,
            "productname" => Column::ProductName,
            "category" => Column::Category,
            "storetype" => Column::StoreType,
            "city" => Column::City,
            "paymentmethod" => Column::PaymentMethod,
            "quantity" => Column::Quantity,
            "unitprice" | "price" => Column::UnitPrice,
            "totalamount" => Column::TotalAmount,
            "discountpct" | "discount" => Column::DiscountPct,
            "transactiondate" | "date" => Column::TransactionDate,
            _ => return None,
        };
        Some(column)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
