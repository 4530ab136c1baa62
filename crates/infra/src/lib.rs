//! Infrastructure layer: persistence, configuration and application services.

/// Runtime configuration loaded from the environment.
pub mod config;

/// Application services composed over a store.
pub mod services;

/// Storage backends (in-memory, Postgres).
pub mod store;

pub use config::{AppConfig, ConfigError};
pub use services::{ServiceError, ServiceResult};
pub use store::{open_store, InMemoryStore, InventoryStore, PostgresStore, StoreError};
