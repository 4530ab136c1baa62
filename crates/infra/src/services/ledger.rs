use std::sync::Arc;

use pharmatrack_sales::LedgerEntry;

use super::ServiceResult;
use crate::store::InventoryStore;

pub const DEFAULT_LEDGER_LIMIT: i64 = 200;

/// Read side of the transaction ledger.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn InventoryStore>,
}

impl Ledger {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store }
    }

    /// Newest first. `None` means the default page of 200; larger requests
    /// are capped by the store.
    pub async fn recent(&self, limit: Option<i64>) -> ServiceResult<Vec<LedgerEntry>> {
        Ok(self
            .store
            .recent_transactions(limit.unwrap_or(DEFAULT_LEDGER_LIMIT))
            .await?)
    }

    pub async fn count(&self) -> ServiceResult<i64> {
        Ok(self.store.transaction_count().await?)
    }
}
