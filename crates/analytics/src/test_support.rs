use chrono::NaiveDate;
use core_types::{Transaction, WorkingTable};
use rust_decimal::Decimal;

/// Builder for ledger lines in tests. Defaults to one unit of an undiscounted
/// product bought on 2024-01-01.
pub(crate) struct TxBuilder(Transaction);

pub(crate) fn tx(id: &str, customer: &str, total: Decimal) -> TxBuilder {
    TxBuilder(Transaction {
        transaction_id: id.to_string(),
        customer_id: customer.to_string(),
        product_id: "P1".to_string(),
        product_name: Some("Product 1".to_string()),
        category: Some("General".to_string()),
        store_type: Some("Supermarket".to_string()),
        city: Some("Springfield".to_string()),
        payment_method: Some("Cash".to_string()),
        quantity: 1,
        unit_price: total,
        total_amount: total,
        discount_pct: Decimal::ZERO,
        transaction_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
    })
}

impl TxBuilder {
    pub(crate) fn product(mut self, id: &str) -> Self {
        self.0.product_id = id.to_string();
        self.0.product_name = Some(format!("Name of {id}"));
        self
    }

    pub(crate) fn city(mut self, city: Option<&str>) -> Self {
        self.0.city = city.map(str::to_string);
        self
    }

    pub(crate) fn category(mut self, category: &str) -> Self {
        self.0.category = Some(category.to_string());
        self
    }

    pub(crate) fn quantity(mut self, quantity: u32) -> Self {
        self.0.quantity = quantity;
        self.0.unit_price = self.0.unit_price / Decimal::from(quantity.max(1));
        self
    }

    /// Sets the discount and back-computes the list price so that the line
    /// stays consistent: `total = quantity * unit_price * (1 - d / 100)`.
    pub(crate) fn discount(mut self, pct: Decimal) -> Self {
        self.0.discount_pct = pct;
        let keep = Decimal::ONE - pct / Decimal::ONE_HUNDRED;
        if !keep.is_zero() {
            self.0.unit_price =
                self.0.total_amount / keep / Decimal::from(self.0.quantity.max(1));
        }
        self
    }

    pub(crate) fn date(mut self, year: i32, month: u32, day: u32) -> Self {
        self.0.transaction_date = NaiveDate::from_ymd_opt(year, month, day).unwrap();
        self
    }

    pub(crate) fn build(self) -> Transaction {
        self.0
    }
}

pub(crate) fn table(transactions: Vec<TxBuilder>) -> WorkingTable {
    WorkingTable::from_transactions(transactions.into_iter().map(TxBuilder::build).collect())
}

/// The three-customer ledger used throughout: A spends 100 without discount,
/// B spends 50 with a 10% discount, C spends 200 without discount.
pub(crate) fn three_customers() -> WorkingTable {
    use rust_decimal_macros::dec;
    table(vec![
        tx("T1", "A", dec!(100)).product("P1"),
        tx("T2", "B", dec!(50)).product("P2").discount(dec!(10)),
        tx("T3", "C", dec!(200)).product("P1"),
    ])
}
