//! Application services: orchestration over an [`InventoryStore`].
//!
//! Each service validates input before it touches storage, delegates the
//! atomic write to the store and logs the outcome. Failures from every layer
//! are folded into [`ServiceError`].

pub mod catalog;
pub mod forecasting;
pub mod ledger;
pub mod recall;
pub mod sales_desk;
pub mod stock_room;

use thiserror::Error;

use pharmatrack_ai::AiError;
use pharmatrack_core::{BatchId, DomainError, ProductId};
use pharmatrack_inventory::AllocationError;

use crate::store::StoreError;

pub use catalog::Catalog;
pub use forecasting::Forecasting;
pub use ledger::Ledger;
pub use recall::RecallDesk;
pub use sales_desk::{SaleRecommendation, SalesDesk};
pub use stock_room::StockRoom;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("unknown product: {0}")]
    UnknownProduct(String),

    #[error("unknown batch: {0}")]
    UnknownBatch(String),

    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },

    #[error("batch {batch_id} changed concurrently; gave up after {attempts} attempt(s)")]
    StaleBatchState { batch_id: BatchId, attempts: u32 },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Forecast(#[from] AiError),

    #[error("store error: {0}")]
    Store(String),
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::UnknownProduct(id) => ServiceError::UnknownProduct(id.to_string()),
            StoreError::UnknownBatch(b) => ServiceError::UnknownBatch(b),
            StoreError::Allocation(e) => e.into(),
            StoreError::Domain(DomainError::Conflict(msg)) | StoreError::Conflict(msg) => {
                ServiceError::Conflict(msg)
            }
            StoreError::Domain(e) => ServiceError::Domain(e),
            StoreError::Backend(msg) => ServiceError::Store(msg),
        }
    }
}

impl From<AllocationError> for ServiceError {
    fn from(value: AllocationError) -> Self {
        match value {
            AllocationError::InsufficientStock {
                product_id,
                requested,
                available,
            } => ServiceError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            AllocationError::ForeignBatch { .. } => {
                ServiceError::Domain(DomainError::invariant(value.to_string()))
            }
            AllocationError::StaleBatchState { batch_id, .. } => ServiceError::StaleBatchState {
                batch_id,
                attempts: 1,
            },
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
