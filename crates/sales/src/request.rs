//! Inbound requests. Quantities arrive as raw integers and are validated into
//! [`Quantity`] before anything touches storage.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use pharmatrack_core::{BatchId, DomainResult, ProductId, Quantity};

use crate::transaction::ensure_unit_price;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRequest {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Decimal,
    #[serde(default)]
    pub customer_phone: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl SaleRequest {
    pub fn validate(&self) -> DomainResult<Quantity> {
        let quantity = Quantity::new(self.quantity)?;
        ensure_unit_price(self.unit_price)?;
        Ok(quantity)
    }

    pub fn sale_date(&self) -> NaiveDate {
        self.occurred_at.date_naive()
    }
}

/// A customer bringing units of one batch back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnRequest {
    pub batch_id: BatchId,
    pub quantity: i64,
    pub unit_price: Decimal,
    #[serde(default)]
    pub customer_phone: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl ReturnRequest {
    pub fn validate(&self) -> DomainResult<Quantity> {
        let quantity = Quantity::new(self.quantity)?;
        ensure_unit_price(self.unit_price)?;
        Ok(quantity)
    }
}

/// Receipt of a new batch from a supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockInRequest {
    pub product_id: ProductId,
    #[serde(default)]
    pub supplier_batch_number: Option<String>,
    /// Generated from the product name and receipt month when absent.
    #[serde(default)]
    pub internal_batch_code: Option<String>,
    #[serde(default)]
    pub manufacture_date: Option<NaiveDate>,
    pub expiry_date: NaiveDate,
    pub quantity: i64,
    /// Purchase price per unit.
    #[serde(default)]
    pub unit_price: Decimal,
    pub occurred_at: DateTime<Utc>,
}

impl StockInRequest {
    pub fn validate(&self) -> DomainResult<Quantity> {
        let quantity = Quantity::new(self.quantity)?;
        ensure_unit_price(self.unit_price)?;
        Ok(quantity)
    }

    /// The caller-supplied code, if it is not blank.
    pub fn explicit_batch_code(&self) -> Option<&str> {
        self.internal_batch_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}
