use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use pharmatrack_core::{BatchId, DomainError, DomainResult, Entity, ProductId, Quantity};

/// Lifecycle state of a batch on a given date.
///
/// `Depleted` and `Expired` are terminal for allocation purposes: the sales
/// path never moves a batch back to `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchState {
    Active,
    Depleted,
    Expired,
}

/// A tracked quantity of one product sharing manufacture/expiry metadata.
///
/// Mirrors the `batches` row. Quantity changes go through [`Batch::deduct`]
/// and [`Batch::restock`] so the non-negative invariant holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub product_id: ProductId,
    pub supplier_batch_number: Option<String>,
    pub internal_batch_code: String,
    pub manufacture_date: Option<NaiveDate>,
    pub expiry_date: NaiveDate,
    pub quantity_remaining: i64,
    pub created_at: DateTime<Utc>,
}

/// Command: ReceiveBatch (stock-in of a new batch).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveBatch {
    pub batch_id: BatchId,
    pub product_id: ProductId,
    pub supplier_batch_number: Option<String>,
    pub internal_batch_code: String,
    pub manufacture_date: Option<NaiveDate>,
    pub expiry_date: NaiveDate,
    pub quantity: Quantity,
    pub occurred_at: DateTime<Utc>,
}

impl Batch {
    /// Validate a stock-in and build the new batch.
    pub fn receive(cmd: ReceiveBatch) -> DomainResult<Self> {
        let code = cmd.internal_batch_code.trim();
        if code.is_empty() {
            return Err(DomainError::validation("internal batch code cannot be empty"));
        }
        if let Some(mfg) = cmd.manufacture_date {
            if mfg > cmd.expiry_date {
                return Err(DomainError::validation(format!(
                    "manufacture date {mfg} is after expiry date {}",
                    cmd.expiry_date
                )));
            }
        }

        let supplier_batch_number = cmd
            .supplier_batch_number
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Self {
            id: cmd.batch_id,
            product_id: cmd.product_id,
            supplier_batch_number,
            internal_batch_code: code.to_string(),
            manufacture_date: cmd.manufacture_date,
            expiry_date: cmd.expiry_date,
            quantity_remaining: cmd.quantity.get(),
            created_at: cmd.occurred_at,
        })
    }

    pub fn state_on(&self, date: NaiveDate) -> BatchState {
        if self.quantity_remaining <= 0 {
            BatchState::Depleted
        } else if self.is_expired_on(date) {
            BatchState::Expired
        } else {
            BatchState::Active
        }
    }

    /// Expired means the expiry date lies strictly before `date`; stock
    /// expiring today is still sellable today.
    pub fn is_expired_on(&self, date: NaiveDate) -> bool {
        self.expiry_date < date
    }

    pub fn is_eligible_on(&self, date: NaiveDate) -> bool {
        self.state_on(date) == BatchState::Active
    }

    /// Days from `today` to expiry; negative once expired.
    pub fn days_until_expiry(&self, today: NaiveDate) -> i64 {
        (self.expiry_date - today).num_days()
    }

    /// FEFO sort key: expiry first, then creation order, then id.
    pub fn fefo_key(&self) -> (NaiveDate, DateTime<Utc>, BatchId) {
        (self.expiry_date, self.created_at, self.id)
    }

    pub fn deduct(&mut self, quantity: Quantity) -> DomainResult<()> {
        let new_remaining = self.quantity_remaining - quantity.get();
        if new_remaining < 0 {
            return Err(DomainError::invariant(format!(
                "batch {} cannot go negative (remaining {}, deducting {})",
                self.internal_batch_code, self.quantity_remaining, quantity
            )));
        }
        self.quantity_remaining = new_remaining;
        Ok(())
    }

    /// Put returned units back. Only an `Active` batch takes stock back;
    /// depleted or expired batches stay terminal.
    pub fn restock(&mut self, quantity: Quantity, on: NaiveDate) -> DomainResult<()> {
        match self.state_on(on) {
            BatchState::Active => {
                self.quantity_remaining = self
                    .quantity_remaining
                    .checked_add(quantity.get())
                    .ok_or_else(|| {
                        DomainError::invariant(format!(
                            "batch {} cannot hold {} more units",
                            self.internal_batch_code, quantity
                        ))
                    })?;
                Ok(())
            }
            state => Err(DomainError::invariant(format!(
                "batch {} is {state:?} and cannot be restocked",
                self.internal_batch_code
            ))),
        }
    }
}

impl Entity for Batch {
    type Id = BatchId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn receive_cmd(qty: i64) -> ReceiveBatch {
        ReceiveBatch {
            batch_id: BatchId::new(),
            product_id: ProductId::new(),
            supplier_batch_number: Some(" SUP-991 ".to_string()),
            internal_batch_code: "DOLO6-202401-001".to_string(),
            manufacture_date: Some(date(2024, 1, 1)),
            expiry_date: date(2025, 1, 1),
            quantity: Quantity::new(qty).unwrap(),
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn receive_sets_remaining_to_received_quantity() {
        let batch = Batch::receive(receive_cmd(40)).unwrap();
        assert_eq!(batch.quantity_remaining, 40);
        assert_eq!(batch.supplier_batch_number.as_deref(), Some("SUP-991"));
    }

    #[test]
    fn receive_rejects_manufacture_after_expiry() {
        let mut cmd = receive_cmd(10);
        cmd.manufacture_date = Some(date(2026, 1, 1));
        assert!(matches!(Batch::receive(cmd), Err(DomainError::Validation(_))));
    }

    #[test]
    fn receive_rejects_blank_code() {
        let mut cmd = receive_cmd(10);
        cmd.internal_batch_code = "  ".to_string();
        assert!(matches!(Batch::receive(cmd), Err(DomainError::Validation(_))));
    }

    #[test]
    fn state_follows_quantity_then_expiry() {
        let mut batch = Batch::receive(receive_cmd(5)).unwrap();
        assert_eq!(batch.state_on(date(2025, 1, 1)), BatchState::Active);
        assert_eq!(batch.state_on(date(2025, 1, 2)), BatchState::Expired);

        batch.deduct(Quantity::new(5).unwrap()).unwrap();
        assert_eq!(batch.state_on(date(2024, 6, 1)), BatchState::Depleted);
        assert_eq!(batch.state_on(date(2025, 6, 1)), BatchState::Depleted);
    }

    #[test]
    fn deduct_never_goes_negative() {
        let mut batch = Batch::receive(receive_cmd(3)).unwrap();
        let err = batch.deduct(Quantity::new(4).unwrap()).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert_eq!(batch.quantity_remaining, 3);
    }

    #[test]
    fn restock_past_i64_max_is_an_invariant_violation() {
        let mut batch = Batch::receive(receive_cmd(10)).unwrap();
        batch.quantity_remaining = i64::MAX - 1;
        let err = batch.restock(Quantity::new(2).unwrap(), date(2024, 6, 1)).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert_eq!(batch.quantity_remaining, i64::MAX - 1);
    }

    #[test]
    fn restock_refuses_terminal_batches() {
        let mut batch = Batch::receive(receive_cmd(2)).unwrap();
        batch.deduct(Quantity::new(2).unwrap()).unwrap();
        assert!(batch.restock(Quantity::new(1).unwrap(), date(2024, 6, 1)).is_err());

        let mut expired = Batch::receive(receive_cmd(2)).unwrap();
        assert!(expired.restock(Quantity::new(1).unwrap(), date(2025, 2, 1)).is_err());

        let mut active = Batch::receive(receive_cmd(2)).unwrap();
        active.restock(Quantity::new(1).unwrap(), date(2024, 6, 1)).unwrap();
        assert_eq!(active.quantity_remaining, 3);
    }

    #[test]
    fn days_until_expiry_goes_negative() {
        let batch = Batch::receive(receive_cmd(1)).unwrap();
        assert_eq!(batch.days_until_expiry(date(2024, 12, 22)), 10);
        assert_eq!(batch.days_until_expiry(date(2025, 1, 3)), -2);
    }
}
