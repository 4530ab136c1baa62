//! Point of sale: FEFO preview, sales with retry on concurrent change, and
//! returns.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use pharmatrack_core::{BatchId, ProductId, Quantity};
use pharmatrack_inventory::{plan_fefo, AllocationError, AllocationLine};
use pharmatrack_products::ComplianceCheck;
use pharmatrack_sales::{ReturnReceipt, ReturnRequest, SaleReceipt, SaleRequest};

use super::{Catalog, ServiceError, ServiceResult};
use crate::store::{InventoryStore, ReturnUnit, SaleUnit, StoreError};

/// Read-only preview of what a sale would take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecommendation {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i64,
    /// Internal code of the earliest-expiring batch the sale draws from.
    pub batch_code: String,
    pub days_until_expiry: i64,
    pub compliance: ComplianceCheck,
    pub lines: Vec<AllocationLine>,
    pub expired_batches: Vec<BatchId>,
}

#[derive(Clone)]
pub struct SalesDesk {
    store: Arc<dyn InventoryStore>,
    catalog: Catalog,
    max_attempts: u32,
}

impl SalesDesk {
    pub fn new(store: Arc<dyn InventoryStore>, max_attempts: u32) -> Self {
        Self {
            catalog: Catalog::new(store.clone()),
            store,
            max_attempts: max_attempts.max(1),
        }
    }

    /// FEFO preview for the first product matching `search`. Nothing is
    /// written.
    pub async fn recommend(
        &self,
        search: &str,
        quantity: i64,
        on: NaiveDate,
    ) -> ServiceResult<SaleRecommendation> {
        let quantity = Quantity::new(quantity)?;
        let product = self.catalog.find(search).await?;
        let batches = self.store.batches_for_product(product.id_typed()).await?;
        let plan = plan_fefo(product.id_typed(), quantity, &batches, on)?;

        let primary = plan.primary_line().ok_or_else(|| {
            ServiceError::Store("allocation plan without lines".to_string())
        })?;

        Ok(SaleRecommendation {
            product_id: product.id_typed(),
            product_name: product.name().to_string(),
            quantity: quantity.get(),
            batch_code: primary.internal_batch_code.clone(),
            days_until_expiry: (primary.expiry_date - on).num_days(),
            compliance: product.compliance_check(),
            lines: plan.lines.clone(),
            expired_batches: plan.expired_batches,
        })
    }

    /// Sell FEFO. The quantity is validated before the store is touched; a
    /// sale that loses a race on a batch is replanned up to the configured
    /// number of attempts.
    pub async fn sell(&self, req: SaleRequest) -> ServiceResult<SaleReceipt> {
        let quantity = req.validate()?;
        let unit = SaleUnit {
            product_id: req.product_id,
            quantity,
            unit_price: req.unit_price,
            customer_phone: req.customer_phone.clone(),
            occurred_at: req.occurred_at,
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.store.allocate_sale(&unit).await {
                Ok(receipt) => {
                    info!(
                        product_id = %receipt.product_id,
                        quantity = receipt.quantity,
                        lines = receipt.lines.len(),
                        total = %receipt.total_amount,
                        attempt,
                        "sale committed"
                    );
                    if !receipt.expired_batches.is_empty() {
                        warn!(
                            product_id = %receipt.product_id,
                            expired = receipt.expired_batches.len(),
                            "expired batches still on the shelf"
                        );
                    }
                    return Ok(receipt);
                }
                Err(StoreError::Allocation(AllocationError::StaleBatchState { batch_id, .. })) => {
                    if attempt >= self.max_attempts {
                        warn!(product_id = %unit.product_id, %batch_id, attempt, "sale abandoned after concurrent changes");
                        return Err(ServiceError::StaleBatchState {
                            batch_id,
                            attempts: attempt,
                        });
                    }
                    warn!(product_id = %unit.product_id, %batch_id, attempt, "batch changed during sale; retrying");
                }
                Err(e) => {
                    let err = ServiceError::from(e);
                    warn!(product_id = %unit.product_id, quantity = quantity.get(), error = %err, "sale rejected");
                    return Err(err);
                }
            }
        }
    }

    /// Take goods back against the batch they were sold from.
    pub async fn accept_return(&self, req: ReturnRequest) -> ServiceResult<ReturnReceipt> {
        let quantity = req.validate()?;
        let unit = ReturnUnit {
            batch_id: req.batch_id,
            quantity,
            unit_price: req.unit_price,
            customer_phone: req.customer_phone.clone(),
            occurred_at: req.occurred_at,
        };

        let receipt = self.store.record_return(&unit).await.map_err(|e| {
            warn!(batch_id = %unit.batch_id, quantity = quantity.get(), error = %e, "return rejected");
            ServiceError::from(e)
        })?;
        info!(
            batch_id = %unit.batch_id,
            code = %receipt.internal_batch_code,
            quantity = quantity.get(),
            outcome = ?receipt.outcome,
            "return recorded"
        );
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use pharmatrack_ai::SaleRecord;
    use pharmatrack_core::DomainError;
    use pharmatrack_inventory::{Batch, ReceiveBatch};
    use pharmatrack_products::{CreateProduct, Product};
    use pharmatrack_sales::{LedgerEntry, ReturnOutcome, Transaction, TransactionType};

    use crate::store::InMemoryStore;

    /// Delegates to an in-memory store but reports the first `stale` sales as
    /// having lost a race.
    struct RacyStore {
        inner: InMemoryStore,
        stale: AtomicU32,
        sale_calls: AtomicU32,
    }

    #[async_trait::async_trait]
    impl InventoryStore for RacyStore {
        async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
            self.inner.insert_product(product).await
        }
        async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
            self.inner.product(id).await
        }
        async fn products(&self) -> Result<Vec<Product>, StoreError> {
            self.inner.products().await
        }
        async fn batches_for_product(&self, id: ProductId) -> Result<Vec<Batch>, StoreError> {
            self.inner.batches_for_product(id).await
        }
        async fn batch(&self, id: BatchId) -> Result<Option<Batch>, StoreError> {
            self.inner.batch(id).await
        }
        async fn batch_by_code(&self, code: &str) -> Result<Option<Batch>, StoreError> {
            self.inner.batch_by_code(code).await
        }
        async fn batch_codes_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
            self.inner.batch_codes_with_prefix(prefix).await
        }
        async fn batches_in_stock(&self) -> Result<Vec<(Batch, String)>, StoreError> {
            self.inner.batches_in_stock().await
        }
        async fn receive_batch(&self, batch: &Batch, stock_in: &Transaction) -> Result<(), StoreError> {
            self.inner.receive_batch(batch, stock_in).await
        }
        async fn allocate_sale(&self, sale: &SaleUnit) -> Result<SaleReceipt, StoreError> {
            self.sale_calls.fetch_add(1, Ordering::SeqCst);
            let left = self.stale.load(Ordering::SeqCst);
            if left > 0 {
                self.stale.store(left - 1, Ordering::SeqCst);
                let batch = self.inner.batches_for_product(sale.product_id).await?;
                return Err(AllocationError::StaleBatchState {
                    batch_id: batch[0].id,
                    expected: 5,
                    found: 0,
                }
                .into());
            }
            self.inner.allocate_sale(sale).await
        }
        async fn record_return(&self, ret: &ReturnUnit) -> Result<ReturnReceipt, StoreError> {
            self.inner.record_return(ret).await
        }
        async fn recent_transactions(&self, limit: i64) -> Result<Vec<LedgerEntry>, StoreError> {
            self.inner.recent_transactions(limit).await
        }
        async fn transaction_count(&self) -> Result<i64, StoreError> {
            self.inner.transaction_count().await
        }
        async fn transactions_for_batch(&self, id: BatchId) -> Result<Vec<Transaction>, StoreError> {
            self.inner.transactions_for_batch(id).await
        }
        async fn sale_history(&self) -> Result<Vec<SaleRecord>, StoreError> {
            self.inner.sale_history().await
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn stock(store: &dyn InventoryStore, rx: bool) -> (ProductId, BatchId, BatchId) {
        let product = Product::create(CreateProduct {
            product_id: ProductId::new(),
            name: "Amoxicillin 250".to_string(),
            category: "Antibiotic".to_string(),
            seasonal_tag: None,
            requires_prescription: rx,
            occurred_at: Utc::now(),
        })
        .unwrap();
        store.insert_product(&product).await.unwrap();

        let mut ids = Vec::new();
        for (code, expiry, qty) in [("A", date(2025, 1, 1), 5), ("B", date(2025, 6, 1), 10)] {
            let at = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
            let batch = Batch::receive(ReceiveBatch {
                batch_id: BatchId::new(),
                product_id: product.id_typed(),
                supplier_batch_number: None,
                internal_batch_code: code.to_string(),
                manufacture_date: None,
                expiry_date: expiry,
                quantity: Quantity::new(qty).unwrap(),
                occurred_at: at,
            })
            .unwrap();
            let tx = Transaction::record(
                TransactionType::StockIn,
                product.id_typed(),
                Some(batch.id),
                Quantity::new(qty).unwrap(),
                Decimal::ZERO,
                at,
                None,
            )
            .unwrap();
            store.receive_batch(&batch, &tx).await.unwrap();
            ids.push(batch.id);
        }
        (product.id_typed(), ids[0], ids[1])
    }

    fn sale(product_id: ProductId, quantity: i64) -> SaleRequest {
        SaleRequest {
            product_id,
            quantity,
            unit_price: Decimal::new(350, 2),
            customer_phone: Some("555-0199".to_string()),
            occurred_at: Utc.with_ymd_and_hms(2024, 12, 1, 10, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn recommendation_previews_fefo_without_writing() {
        let store = Arc::new(InMemoryStore::new());
        let (_, a, _) = stock(store.as_ref(), true).await;
        let desk = SalesDesk::new(store.clone(), 3);

        let rec = desk.recommend("amoxi", 8, date(2024, 12, 1)).await.unwrap();
        assert_eq!(rec.batch_code, "A");
        assert_eq!(rec.days_until_expiry, 31);
        assert_eq!(rec.compliance, ComplianceCheck::VerifyPrescription);
        assert_eq!(rec.lines.len(), 2);

        assert_eq!(store.batch(a).await.unwrap().unwrap().quantity_remaining, 5);
        assert_eq!(store.transaction_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn recommendation_reports_shortfalls_and_unknown_products() {
        let store = Arc::new(InMemoryStore::new());
        stock(store.as_ref(), false).await;
        let desk = SalesDesk::new(store, 3);

        assert!(matches!(
            desk.recommend("amoxi", 16, date(2024, 12, 1)).await,
            Err(ServiceError::InsufficientStock { requested: 16, available: 15, .. })
        ));
        assert!(matches!(
            desk.recommend("aspirin", 1, date(2024, 12, 1)).await,
            Err(ServiceError::UnknownProduct(_))
        ));
    }

    #[tokio::test]
    async fn sale_is_split_across_batches() {
        let store = Arc::new(InMemoryStore::new());
        let (p, a, b) = stock(store.as_ref(), false).await;
        let desk = SalesDesk::new(store.clone(), 3);

        let receipt = desk.sell(sale(p, 8)).await.unwrap();
        assert_eq!(receipt.transactions.len(), 2);
        assert_eq!(receipt.total_amount, Decimal::new(2800, 2));
        assert_eq!(store.batch(a).await.unwrap().unwrap().quantity_remaining, 0);
        assert_eq!(store.batch(b).await.unwrap().unwrap().quantity_remaining, 7);
    }

    #[tokio::test]
    async fn invalid_quantity_is_rejected_before_the_store() {
        let racy = Arc::new(RacyStore {
            inner: InMemoryStore::new(),
            stale: AtomicU32::new(0),
            sale_calls: AtomicU32::new(0),
        });
        let (p, _, _) = stock(racy.as_ref(), false).await;
        let desk = SalesDesk::new(racy.clone(), 3);

        for qty in [0, -4] {
            let err = desk.sell(sale(p, qty)).await.unwrap_err();
            assert!(matches!(err, ServiceError::Domain(DomainError::InvalidQuantity(n)) if n == qty));
        }
        assert_eq!(racy.sale_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stale_batches_are_retried_until_the_sale_commits() {
        let racy = Arc::new(RacyStore {
            inner: InMemoryStore::new(),
            stale: AtomicU32::new(2),
            sale_calls: AtomicU32::new(0),
        });
        let (p, _, b) = stock(racy.as_ref(), false).await;
        let desk = SalesDesk::new(racy.clone(), 3);

        let receipt = desk.sell(sale(p, 8)).await.unwrap();
        assert_eq!(receipt.quantity, 8);
        assert_eq!(racy.sale_calls.load(Ordering::SeqCst), 3);
        assert_eq!(racy.batch(b).await.unwrap().unwrap().quantity_remaining, 7);
    }

    #[tokio::test]
    async fn stale_batches_surface_after_the_last_attempt() {
        let racy = Arc::new(RacyStore {
            inner: InMemoryStore::new(),
            stale: AtomicU32::new(10),
            sale_calls: AtomicU32::new(0),
        });
        let (p, a, _) = stock(racy.as_ref(), false).await;
        let desk = SalesDesk::new(racy.clone(), 3);

        let err = desk.sell(sale(p, 8)).await.unwrap_err();
        assert!(matches!(err, ServiceError::StaleBatchState { attempts: 3, .. }));
        assert_eq!(racy.sale_calls.load(Ordering::SeqCst), 3);
        assert_eq!(racy.batch(a).await.unwrap().unwrap().quantity_remaining, 5);
    }

    #[tokio::test]
    async fn insufficient_stock_is_not_retried() {
        let racy = Arc::new(RacyStore {
            inner: InMemoryStore::new(),
            stale: AtomicU32::new(0),
            sale_calls: AtomicU32::new(0),
        });
        let (p, _, _) = stock(racy.as_ref(), false).await;
        let desk = SalesDesk::new(racy.clone(), 3);

        let err = desk.sell(sale(p, 20)).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InsufficientStock { requested: 20, available: 15, .. }
        ));
        assert_eq!(racy.sale_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn returns_restock_or_quarantine() {
        let store = Arc::new(InMemoryStore::new());
        let (p, a, b) = stock(store.as_ref(), false).await;
        let desk = SalesDesk::new(store.clone(), 3);
        desk.sell(sale(p, 8)).await.unwrap();

        let back = |batch_id, quantity| ReturnRequest {
            batch_id,
            quantity,
            unit_price: Decimal::new(350, 2),
            customer_phone: None,
            occurred_at: Utc.with_ymd_and_hms(2024, 12, 2, 10, 0, 0).unwrap(),
        };

        let restocked = desk.accept_return(back(b, 2)).await.unwrap();
        assert_eq!(restocked.outcome, ReturnOutcome::Restocked);
        assert_eq!(restocked.quantity_remaining, 9);

        let quarantined = desk.accept_return(back(a, 1)).await.unwrap();
        assert_eq!(quarantined.outcome, ReturnOutcome::Quarantined);
        assert_eq!(quarantined.quantity_remaining, 0);

        assert!(matches!(
            desk.accept_return(back(b, 2)).await,
            Err(ServiceError::Domain(DomainError::InvariantViolation(_)))
        ));
        assert!(matches!(
            desk.accept_return(back(BatchId::new(), 1)).await,
            Err(ServiceError::UnknownBatch(_))
        ));
        assert!(matches!(
            desk.accept_return(back(b, 0)).await,
            Err(ServiceError::Domain(DomainError::InvalidQuantity(0)))
        ));
    }
}
