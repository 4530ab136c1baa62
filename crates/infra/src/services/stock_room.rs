use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use pharmatrack_core::{BatchId, DomainError, ProductId};
use pharmatrack_inventory::{
    batch_code_prefix, expiry_risk, next_batch_code, Batch, ExpiryAlert, ReceiveBatch,
};
use pharmatrack_sales::{StockInReceipt, StockInRequest, Transaction, TransactionType};

use super::{ServiceError, ServiceResult};
use crate::store::{InventoryStore, StoreError};

/// Generated codes can race with a concurrent stock-in of the same product
/// and month; regenerate this many times before giving up.
const GENERATED_CODE_ATTEMPTS: u32 = 3;

/// Receiving and stock reporting.
#[derive(Clone)]
pub struct StockRoom {
    store: Arc<dyn InventoryStore>,
    expiry_risk_days: i64,
}

impl StockRoom {
    pub fn new(store: Arc<dyn InventoryStore>, expiry_risk_days: i64) -> Self {
        Self {
            store,
            expiry_risk_days,
        }
    }

    /// Create a batch and its STOCK_IN record in one atomic write.
    pub async fn receive_stock(&self, req: StockInRequest) -> ServiceResult<StockInReceipt> {
        let quantity = req.validate()?;
        let product = self
            .store
            .product(req.product_id)
            .await?
            .ok_or_else(|| ServiceError::UnknownProduct(req.product_id.to_string()))?;
        let received_on = req.occurred_at.date_naive();
        let explicit = req.explicit_batch_code().map(str::to_string);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let code = match &explicit {
                Some(code) => code.clone(),
                None => {
                    let prefix = batch_code_prefix(product.name(), received_on);
                    let existing = self.store.batch_codes_with_prefix(&prefix).await?;
                    next_batch_code(product.name(), received_on, existing.iter().map(String::as_str))
                }
            };

            let batch = Batch::receive(ReceiveBatch {
                batch_id: BatchId::new(),
                product_id: product.id_typed(),
                supplier_batch_number: req.supplier_batch_number.clone(),
                internal_batch_code: code,
                manufacture_date: req.manufacture_date,
                expiry_date: req.expiry_date,
                quantity,
                occurred_at: req.occurred_at,
            })?;
            let transaction = Transaction::record(
                TransactionType::StockIn,
                batch.product_id,
                Some(batch.id),
                quantity,
                req.unit_price,
                req.occurred_at,
                None,
            )?;

            match self.store.receive_batch(&batch, &transaction).await {
                Ok(()) => {
                    info!(
                        product_id = %batch.product_id,
                        batch_id = %batch.id,
                        code = %batch.internal_batch_code,
                        quantity = batch.quantity_remaining,
                        expiry = %batch.expiry_date,
                        "stock received"
                    );
                    return Ok(StockInReceipt { batch, transaction });
                }
                Err(StoreError::Conflict(msg))
                    if explicit.is_none() && attempt < GENERATED_CODE_ATTEMPTS =>
                {
                    warn!(attempt, code = %batch.internal_batch_code, error = %msg, "generated batch code taken; retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// A product's batches in FEFO order.
    pub async fn batches(&self, product_id: ProductId) -> ServiceResult<Vec<Batch>> {
        self.ensure_product(product_id).await?;
        Ok(self.store.batches_for_product(product_id).await?)
    }

    /// Units left across every batch of the product, expired ones included.
    pub async fn total_stock(&self, product_id: ProductId) -> ServiceResult<i64> {
        Ok(self
            .batches(product_id)
            .await?
            .iter()
            .map(|b| b.quantity_remaining)
            .sum())
    }

    /// Stock expiring within `threshold_days` of `today` (configured default
    /// when `None`), soonest first.
    pub async fn expiry_risk(
        &self,
        today: NaiveDate,
        threshold_days: Option<i64>,
    ) -> ServiceResult<Vec<ExpiryAlert>> {
        let threshold = threshold_days.unwrap_or(self.expiry_risk_days);
        if threshold < 0 {
            return Err(DomainError::validation(format!(
                "expiry window cannot be negative (got {threshold})"
            ))
            .into());
        }
        let in_stock = self.store.batches_in_stock().await?;
        Ok(expiry_risk(
            in_stock.iter().map(|(b, name)| (b, name.as_str())),
            today,
            threshold,
        ))
    }

    async fn ensure_product(&self, product_id: ProductId) -> ServiceResult<()> {
        match self.store.product(product_id).await? {
            Some(_) => Ok(()),
            None => Err(ServiceError::UnknownProduct(product_id.to_string())),
        }
    }
}
