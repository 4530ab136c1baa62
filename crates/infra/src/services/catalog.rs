use std::sync::Arc;

use tracing::info;

use pharmatrack_core::ProductId;
use pharmatrack_products::{CreateProduct, Product};

use super::{ServiceError, ServiceResult};
use crate::store::InventoryStore;

/// Product catalog.
#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn InventoryStore>,
}

impl Catalog {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, cmd: CreateProduct) -> ServiceResult<Product> {
        let product = Product::create(cmd)?;
        self.store.insert_product(&product).await?;
        info!(product_id = %product.id_typed(), name = product.name(), "product created");
        Ok(product)
    }

    pub async fn get(&self, id: ProductId) -> ServiceResult<Product> {
        self.store
            .product(id)
            .await?
            .ok_or_else(|| ServiceError::UnknownProduct(id.to_string()))
    }

    /// Products whose name contains `search` (case-insensitive), by name.
    /// A missing or blank term lists everything.
    pub async fn list(&self, search: Option<&str>) -> ServiceResult<Vec<Product>> {
        let products = self.store.products().await?;
        Ok(match search.map(str::trim).filter(|s| !s.is_empty()) {
            Some(term) => products
                .into_iter()
                .filter(|p| p.matches_search(term))
                .collect(),
            None => products,
        })
    }

    /// First product by name order matching `search`.
    pub async fn find(&self, search: &str) -> ServiceResult<Product> {
        self.list(Some(search))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::UnknownProduct(search.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use chrono::Utc;

    fn cmd(name: &str, rx: bool) -> CreateProduct {
        CreateProduct {
            product_id: ProductId::new(),
            name: name.to_string(),
            category: "Analgesic".to_string(),
            seasonal_tag: None,
            requires_prescription: rx,
            occurred_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn search_is_case_insensitive_and_ordered_by_name() {
        let catalog = Catalog::new(Arc::new(InMemoryStore::new()));
        catalog.create(cmd("Paracetamol 500", false)).await.unwrap();
        catalog.create(cmd("Dolo 650 (Paracetamol)", false)).await.unwrap();
        catalog.create(cmd("Amoxicillin", true)).await.unwrap();

        let hits = catalog.list(Some("PARACETAMOL")).await.unwrap();
        let names: Vec<_> = hits.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["Dolo 650 (Paracetamol)", "Paracetamol 500"]);

        assert_eq!(catalog.list(None).await.unwrap().len(), 3);
        assert_eq!(catalog.find("amox").await.unwrap().name(), "Amoxicillin");
    }

    #[tokio::test]
    async fn missing_products_are_reported() {
        let catalog = Catalog::new(Arc::new(InMemoryStore::new()));
        assert!(matches!(
            catalog.get(ProductId::new()).await,
            Err(ServiceError::UnknownProduct(_))
        ));
        assert!(matches!(
            catalog.find("nothing").await,
            Err(ServiceError::UnknownProduct(_))
        ));
    }

    #[tokio::test]
    async fn blank_names_are_rejected_before_storage() {
        let catalog = Catalog::new(Arc::new(InMemoryStore::new()));
        let err = catalog.create(cmd("   ", false)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(_)));
        assert!(catalog.list(None).await.unwrap().is_empty());
    }
}
