use std::sync::Arc;

use pharmatrack_infra::services::{Catalog, Forecasting, Ledger, RecallDesk, SalesDesk, StockRoom};
use pharmatrack_infra::{AppConfig, InMemoryStore, InventoryStore};

/// Everything a handler can reach, built once at startup.
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Catalog,
    pub stock_room: StockRoom,
    pub sales_desk: SalesDesk,
    pub recall: RecallDesk,
    pub ledger: Ledger,
    pub forecasting: Forecasting,
}

impl AppServices {
    pub fn new(store: Arc<dyn InventoryStore>, config: &AppConfig) -> Self {
        Self {
            catalog: Catalog::new(store.clone()),
            stock_room: StockRoom::new(store.clone(), config.expiry_risk_days),
            sales_desk: SalesDesk::new(store.clone(), config.sale_max_retries),
            recall: RecallDesk::new(store.clone()),
            ledger: Ledger::new(store.clone()),
            forecasting: Forecasting::new(store, config.forecast_horizon_months),
        }
    }

    /// Fresh in-memory backend with default settings (dev/tests).
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()), &AppConfig::default())
    }
}
