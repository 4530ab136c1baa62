use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use pharmatrack_core::{BatchId, DomainError, DomainResult, Entity, ProductId, Quantity, TransactionId};

/// Highest accepted unit price, the range of the ledger's `NUMERIC(12, 2)`
/// price column.
pub const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

/// Reject prices that are negative, above [`MAX_UNIT_PRICE`] or finer than
/// whole cents.
pub fn ensure_unit_price(price: Decimal) -> DomainResult<()> {
    if price < Decimal::ZERO {
        return Err(DomainError::validation(format!(
            "unit price cannot be negative (got {price})"
        )));
    }
    if price > MAX_UNIT_PRICE {
        return Err(DomainError::validation(format!(
            "unit price cannot exceed {MAX_UNIT_PRICE} (got {price})"
        )));
    }
    if price.normalize().scale() > 2 {
        return Err(DomainError::validation(format!(
            "unit price has more than two decimal places (got {price})"
        )));
    }
    Ok(())
}

/// Kind of stock movement. Closed set; stored as its upper-case name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Sale,
    Return,
    StockIn,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Sale => "SALE",
            TransactionType::Return => "RETURN",
            TransactionType::StockIn => "STOCK_IN",
        }
    }

    /// Direction this movement moves a batch's remaining quantity.
    pub fn stock_sign(&self) -> i64 {
        match self {
            TransactionType::Sale => -1,
            TransactionType::Return | TransactionType::StockIn => 1,
        }
    }
}

impl core::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for TransactionType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SALE" => Ok(TransactionType::Sale),
            "RETURN" => Ok(TransactionType::Return),
            "STOCK_IN" => Ok(TransactionType::StockIn),
            other => Err(DomainError::validation(format!(
                "unknown transaction type '{other}'"
            ))),
        }
    }
}

/// Immutable, append-only ledger record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub product_id: ProductId,
    /// `None` only for legacy records written before batch attribution.
    pub batch_id: Option<BatchId>,
    pub quantity: i64,
    pub transaction_type: TransactionType,
    pub unit_price: Decimal,
    pub total_amount: Decimal,
    pub transaction_date: DateTime<Utc>,
    pub customer_phone: Option<String>,
}

impl Transaction {
    /// Build a new ledger record. `total_amount` is always `unit_price × quantity`.
    pub fn record(
        transaction_type: TransactionType,
        product_id: ProductId,
        batch_id: Option<BatchId>,
        quantity: Quantity,
        unit_price: Decimal,
        transaction_date: DateTime<Utc>,
        customer_phone: Option<String>,
    ) -> DomainResult<Self> {
        ensure_unit_price(unit_price)?;
        let total_amount = unit_price
            .checked_mul(Decimal::from(quantity.get()))
            .ok_or_else(|| {
                DomainError::validation(format!(
                    "total for {quantity} units at {unit_price} is out of range"
                ))
            })?
            .round_dp(2);

        Ok(Self {
            id: TransactionId::new(),
            product_id,
            batch_id,
            quantity: quantity.get(),
            transaction_type,
            unit_price,
            total_amount,
            transaction_date,
            customer_phone: normalize_phone(customer_phone),
        })
    }

    /// Signed effect on the referenced batch's remaining quantity.
    pub fn stock_delta(&self) -> i64 {
        self.transaction_type.stock_sign() * self.quantity
    }
}

impl Entity for Transaction {
    type Id = TransactionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Net units sold (SALE minus RETURN) across the given records.
///
/// Callers pass the records of a single batch; STOCK_IN rows are ignored.
pub fn net_sold<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> i64 {
    transactions
        .into_iter()
        .fold(0i64, |net, t| match t.transaction_type {
            TransactionType::Sale => net.saturating_add(t.quantity),
            TransactionType::Return => net.saturating_sub(t.quantity),
            TransactionType::StockIn => net,
        })
}

pub(crate) fn normalize_phone(phone: Option<String>) -> Option<String> {
    phone
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::str::FromStr;

    fn qty(n: i64) -> Quantity {
        Quantity::new(n).unwrap()
    }

    fn sale(quantity: i64, price: &str) -> Transaction {
        Transaction::record(
            TransactionType::Sale,
            ProductId::new(),
            Some(BatchId::new()),
            qty(quantity),
            Decimal::from_str(price).unwrap(),
            Utc::now(),
            Some(" 9876543210 ".to_string()),
        )
        .unwrap()
    }

    #[test]
    fn type_names_round_trip_through_text() {
        for kind in [TransactionType::Sale, TransactionType::Return, TransactionType::StockIn] {
            assert_eq!(TransactionType::from_str(kind.as_str()).unwrap(), kind);
        }
        assert!(TransactionType::from_str("REFUND").is_err());
        assert!(TransactionType::from_str("sale").is_err());
    }

    #[test]
    fn type_serializes_as_upper_case_name() {
        let json = serde_json::to_string(&TransactionType::StockIn).unwrap();
        assert_eq!(json, "\"STOCK_IN\"");
    }

    #[test]
    fn total_is_price_times_quantity() {
        let tx = sale(3, "30.50");
        assert_eq!(tx.total_amount, Decimal::from_str("91.50").unwrap());
        assert_eq!(tx.customer_phone.as_deref(), Some("9876543210"));
    }

    #[test]
    fn negative_price_is_rejected() {
        let err = Transaction::record(
            TransactionType::Sale,
            ProductId::new(),
            None,
            qty(1),
            Decimal::from_str("-1.00").unwrap(),
            Utc::now(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn prices_outside_the_ledger_range_are_rejected() {
        let record = |price: Decimal, quantity: i64| {
            Transaction::record(
                TransactionType::Sale,
                ProductId::new(),
                None,
                qty(quantity),
                price,
                Utc::now(),
                None,
            )
        };

        assert_eq!(MAX_UNIT_PRICE, Decimal::from_str("9999999999.99").unwrap());
        assert!(matches!(record(Decimal::MAX, 2), Err(DomainError::Validation(_))));
        assert!(matches!(
            record(Decimal::from_str("10000000000").unwrap(), 1),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            record(Decimal::from_str("1.005").unwrap(), 1),
            Err(DomainError::Validation(_))
        ));
        assert!(ensure_unit_price(Decimal::from_str("1.500").unwrap()).is_ok());

        let top = record(MAX_UNIT_PRICE, pharmatrack_core::MAX_QUANTITY).unwrap();
        assert_eq!(
            top.total_amount,
            Decimal::from_str("9999999999990000000.00").unwrap()
        );
    }

    #[test]
    fn stock_delta_follows_type() {
        let mut tx = sale(4, "1");
        assert_eq!(tx.stock_delta(), -4);
        tx.transaction_type = TransactionType::Return;
        assert_eq!(tx.stock_delta(), 4);
    }

    #[test]
    fn net_sold_subtracts_returns_and_ignores_stock_in() {
        let mut ledger = vec![sale(5, "1"), sale(3, "1")];
        let mut returned = sale(2, "1");
        returned.transaction_type = TransactionType::Return;
        let mut received = sale(50, "1");
        received.transaction_type = TransactionType::StockIn;
        ledger.push(returned);
        ledger.push(received);
        assert_eq!(net_sold(&ledger), 6);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn total_matches_cents_arithmetic(quantity in 1i64..10_000, cents in 0i64..1_000_000) {
                let tx = Transaction::record(
                    TransactionType::Sale,
                    ProductId::new(),
                    None,
                    qty(quantity),
                    Decimal::new(cents, 2),
                    Utc::now(),
                    None,
                )
                .unwrap();
                prop_assert_eq!(tx.total_amount, Decimal::new(cents * quantity, 2));
            }

            #[test]
            fn lowercase_or_unknown_names_never_parse(name in "[a-z_]{1,12}") {
                prop_assert!(TransactionType::from_str(&name).is_err());
            }
        }
    }
}
