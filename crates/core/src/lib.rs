//! `pharmatrack-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod quantity;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{BatchId, ProductId, TransactionId};
pub use quantity::{Quantity, MAX_QUANTITY};
pub use value_object::ValueObject;
