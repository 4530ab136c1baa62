//! `pharmatrack-ai`
//!
//! **Responsibility:** demand forecasting over sales history.
//!
//! This crate is intentionally **not** part of the domain model:
//! - It must not depend on inventory or sales aggregates.
//! - It must not mutate stock.
//! - It emits **insights** (`AiResult`), never ledger records.

pub mod demand;
pub mod job;
pub mod result;

pub use demand::{
    monthly_series, next_month, top_products, DemandForecast, DemandForecastJob, MonthlyDemand,
    SaleRecord, MAX_MONTHS_AHEAD, MIN_HISTORY_MONTHS,
};
pub use job::AiJob;
pub use result::{AiError, AiResult};
