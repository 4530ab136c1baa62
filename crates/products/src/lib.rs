//! Product catalog domain module.
//!
//! Catalog entries are created once and are read by every other module
//! (batches, sales, forecasting). No IO, no HTTP, no storage.

pub mod product;

pub use product::{ComplianceCheck, CreateProduct, Product};
