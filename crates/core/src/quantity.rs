//! Positive unit counts for sales, returns and stock receipts.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Largest unit count a single sale, return or stock receipt may carry.
///
/// Keeps per-batch stock, FEFO sums and `unit_price * quantity` well inside
/// `i64` and the ledger's `NUMERIC` columns.
pub const MAX_QUANTITY: i64 = 1_000_000_000;

/// A number of units in `1..=MAX_QUANTITY`.
///
/// Every transaction quantity and every allocation request goes through this
/// type, so an out-of-range count is rejected before any storage access.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Quantity(i64);

impl Quantity {
    pub fn new(units: i64) -> DomainResult<Self> {
        if !(1..=MAX_QUANTITY).contains(&units) {
            return Err(DomainError::InvalidQuantity(units));
        }
        Ok(Self(units))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl ValueObject for Quantity {}

impl TryFrom<i64> for Quantity {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for i64 {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}
