use std::sync::Arc;

use tracing::info;

use pharmatrack_ai::{top_products, AiJob, AiResult, DemandForecast, DemandForecastJob};
use pharmatrack_core::ProductId;

use super::{Catalog, ServiceResult};
use crate::store::InventoryStore;

/// Demand forecasting over the SALE history. Read-only.
#[derive(Clone)]
pub struct Forecasting {
    store: Arc<dyn InventoryStore>,
    catalog: Catalog,
    default_months: u32,
}

impl Forecasting {
    pub fn new(store: Arc<dyn InventoryStore>, default_months: u32) -> Self {
        Self {
            catalog: Catalog::new(store.clone()),
            store,
            default_months,
        }
    }

    /// Best sellers by units sold.
    pub async fn top(&self, n: usize) -> ServiceResult<Vec<String>> {
        let history = self.store.sale_history().await?;
        Ok(top_products(&history, n))
    }

    pub async fn forecast(
        &self,
        product_id: ProductId,
        months: Option<u32>,
    ) -> ServiceResult<DemandForecast> {
        let forecast = self.job(product_id, months).await?.forecast()?;
        info!(
            product = %forecast.product_name,
            months = forecast.predictions.len(),
            accuracy = forecast.accuracy,
            "demand forecast computed"
        );
        Ok(forecast)
    }

    /// The forecast packaged as an insight.
    pub async fn insight(&self, product_id: ProductId, months: Option<u32>) -> ServiceResult<AiResult> {
        Ok(self.job(product_id, months).await?.run()?)
    }

    /// Units expected next month and the model accuracy.
    pub async fn next_month(&self, product_id: ProductId) -> ServiceResult<(i64, f64)> {
        let product = self.catalog.get(product_id).await?;
        let history = self.store.sale_history().await?;
        Ok(pharmatrack_ai::next_month(history, product.name())?)
    }

    async fn job(&self, product_id: ProductId, months: Option<u32>) -> ServiceResult<DemandForecastJob> {
        let product = self.catalog.get(product_id).await?;
        let history = self.store.sale_history().await?;
        Ok(DemandForecastJob::new(product.name(), history)
            .with_months_ahead(months.unwrap_or(self.default_months)))
    }
}
