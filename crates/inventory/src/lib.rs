//! Inventory domain module: batches, FEFO allocation, expiry risk.
//!
//! This crate contains business rules for stock held in batches, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod allocation;
pub mod batch;
pub mod batch_code;
pub mod expiry;

pub use allocation::{plan_fefo, AllocationError, AllocationLine, AllocationPlan};
pub use batch::{Batch, BatchState, ReceiveBatch};
pub use batch_code::{batch_code_prefix, next_batch_code};
pub use expiry::{expiry_risk, ExpiryAlert};
