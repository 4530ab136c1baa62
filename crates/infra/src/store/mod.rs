//! Persistence boundary for the catalog, batches and the transaction ledger.
//!
//! Every write that touches more than one row (stock-in, sale, return) is a
//! single method here, so each backend can apply it as one atomic unit.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;
use rust_decimal::Decimal;
use thiserror::Error;

use pharmatrack_ai::SaleRecord;
use pharmatrack_core::{BatchId, DomainError, ProductId, Quantity};
use pharmatrack_inventory::{AllocationError, Batch};
use pharmatrack_products::Product;
use pharmatrack_sales::{LedgerEntry, ReturnReceipt, SaleReceipt, Transaction};

use crate::config::AppConfig;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Hard ceiling on ledger page size.
pub const MAX_LEDGER_LIMIT: i64 = 1_000;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown product: {0}")]
    UnknownProduct(ProductId),

    #[error("unknown batch: {0}")]
    UnknownBatch(String),

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// A validated sale, ready to be planned and applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleUnit {
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub unit_price: Decimal,
    pub customer_phone: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// A validated return against one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnUnit {
    pub batch_id: BatchId,
    pub quantity: Quantity,
    pub unit_price: Decimal,
    pub customer_phone: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait InventoryStore: Send + Sync + 'static {
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError>;

    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// All products ordered by name.
    async fn products(&self) -> Result<Vec<Product>, StoreError>;

    /// A product's batches in FEFO order (expiry, creation, id).
    async fn batches_for_product(&self, id: ProductId) -> Result<Vec<Batch>, StoreError>;

    async fn batch(&self, id: BatchId) -> Result<Option<Batch>, StoreError>;

    async fn batch_by_code(&self, code: &str) -> Result<Option<Batch>, StoreError>;

    /// Internal codes beginning with `prefix`.
    async fn batch_codes_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Every batch with stock left, paired with its product name.
    async fn batches_in_stock(&self) -> Result<Vec<(Batch, String)>, StoreError>;

    /// Insert a new batch and its STOCK_IN record together.
    async fn receive_batch(&self, batch: &Batch, stock_in: &Transaction) -> Result<(), StoreError>;

    /// Plan FEFO against the current batches and apply the plan, all in one
    /// atomic unit. Nothing is written on error.
    async fn allocate_sale(&self, sale: &SaleUnit) -> Result<SaleReceipt, StoreError>;

    /// Record a return and restock or quarantine it, in one atomic unit.
    async fn record_return(&self, ret: &ReturnUnit) -> Result<ReturnReceipt, StoreError>;

    /// Newest first, at most `limit` rows.
    async fn recent_transactions(&self, limit: i64) -> Result<Vec<LedgerEntry>, StoreError>;

    async fn transaction_count(&self) -> Result<i64, StoreError>;

    async fn transactions_for_batch(&self, id: BatchId) -> Result<Vec<Transaction>, StoreError>;

    /// SALE records with product names, oldest first.
    async fn sale_history(&self) -> Result<Vec<SaleRecord>, StoreError>;
}

/// Pick the backend named by the configuration: Postgres (migrated on open)
/// when a database URL is set, otherwise a fresh in-memory store.
pub async fn open_store(config: &AppConfig) -> Result<Arc<dyn InventoryStore>, StoreError> {
    match &config.database_url {
        Some(url) => {
            let pool = postgres::connect(url, config.database_max_connections).await?;
            postgres::migrate(&pool).await?;
            info!(max_connections = config.database_max_connections, "using postgres store");
            Ok(Arc::new(PostgresStore::new(pool)))
        }
        None => {
            info!("DATABASE_URL not set; using in-memory store");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}

pub(crate) fn clamp_limit(limit: i64) -> i64 {
    limit.clamp(0, MAX_LEDGER_LIMIT)
}
