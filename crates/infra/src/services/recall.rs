use std::sync::Arc;

use tracing::info;

use pharmatrack_sales::{safety_reminders, SafetyReminder};

use super::{ServiceError, ServiceResult};
use crate::store::InventoryStore;

/// Patient safety reminders for customers who bought from a batch.
#[derive(Clone)]
pub struct RecallDesk {
    store: Arc<dyn InventoryStore>,
}

impl RecallDesk {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store }
    }

    /// One reminder per distinct contact on the batch's transactions.
    ///
    /// Delivery is simulated: each reminder is logged, nothing is sent.
    pub async fn reminders_for(&self, batch_code: &str) -> ServiceResult<Vec<SafetyReminder>> {
        let code = batch_code.trim();
        let batch = self
            .store
            .batch_by_code(code)
            .await?
            .ok_or_else(|| ServiceError::UnknownBatch(code.to_string()))?;
        let history = self.store.transactions_for_batch(batch.id).await?;

        let reminders = safety_reminders(
            &batch.internal_batch_code,
            batch.expiry_date,
            history.iter().filter_map(|t| t.customer_phone.as_deref()),
        );
        for r in &reminders {
            info!(phone = %r.customer_phone, code = %r.internal_batch_code, "safety reminder queued");
        }
        info!(code = %batch.internal_batch_code, contacts = reminders.len(), "recall reminders prepared");
        Ok(reminders)
    }
}
