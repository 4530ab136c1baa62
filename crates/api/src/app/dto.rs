use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use pharmatrack_core::{BatchId, ProductId};
use pharmatrack_products::CreateProduct;
use pharmatrack_sales::{ReturnRequest, SaleRequest, StockInRequest};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub seasonal_tag: Option<String>,
    #[serde(default)]
    pub requires_prescription: bool,
}

impl CreateProductRequest {
    pub fn into_command(self, now: DateTime<Utc>) -> CreateProduct {
        CreateProduct {
            product_id: ProductId::new(),
            name: self.name,
            category: self.category,
            seasonal_tag: self.seasonal_tag,
            requires_prescription: self.requires_prescription,
            occurred_at: now,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StockInBody {
    pub product_id: ProductId,
    #[serde(default)]
    pub supplier_batch_number: Option<String>,
    #[serde(default)]
    pub internal_batch_code: Option<String>,
    #[serde(default)]
    pub manufacture_date: Option<NaiveDate>,
    pub expiry_date: NaiveDate,
    pub quantity: i64,
    #[serde(default)]
    pub unit_price: Decimal,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

impl StockInBody {
    pub fn into_request(self, now: DateTime<Utc>) -> StockInRequest {
        StockInRequest {
            product_id: self.product_id,
            supplier_batch_number: self.supplier_batch_number,
            internal_batch_code: self.internal_batch_code,
            manufacture_date: self.manufacture_date,
            expiry_date: self.expiry_date,
            quantity: self.quantity,
            unit_price: self.unit_price,
            occurred_at: self.occurred_at.unwrap_or(now),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SaleBody {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Decimal,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

impl SaleBody {
    pub fn into_request(self, now: DateTime<Utc>) -> SaleRequest {
        SaleRequest {
            product_id: self.product_id,
            quantity: self.quantity,
            unit_price: self.unit_price,
            customer_phone: self.customer_phone,
            occurred_at: self.occurred_at.unwrap_or(now),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReturnBody {
    pub batch_id: BatchId,
    pub quantity: i64,
    #[serde(default)]
    pub unit_price: Decimal,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

impl ReturnBody {
    pub fn into_request(self, now: DateTime<Utc>) -> ReturnRequest {
        ReturnRequest {
            batch_id: self.batch_id,
            quantity: self.quantity,
            unit_price: self.unit_price,
            customer_phone: self.customer_phone,
            occurred_at: self.occurred_at.unwrap_or(now),
        }
    }
}

// -------------------------
// Query strings
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ProductSearch {
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    pub product: String,
    pub quantity: i64,
    /// Sale date to plan against; today when absent.
    pub on: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LedgerQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExpiryRiskQuery {
    pub days: Option<i64>,
    pub today: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TopQuery {
    pub n: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ForecastQuery {
    pub months: Option<u32>,
}
