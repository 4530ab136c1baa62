use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use pharmatrack_core::ProductId;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/:id", get(get_product))
        .route("/:id/batches", get(list_batches))
        .route("/:id/stock", get(total_stock))
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreateProductRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::rejection(e),
    };

    match services.catalog.create(body.into_command(Utc::now())).await {
        Ok(product) => (StatusCode::CREATED, Json(product)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::ProductSearch>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::rejection(e),
    };

    match services.catalog.list(query.search.as_deref()).await {
        Ok(products) => Json(products).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ProductId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.catalog.get(id).await {
        Ok(product) => {
            let compliance = product.compliance_check();
            Json(json!({
                "product": product,
                "compliance_check": compliance,
            }))
            .into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_batches(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ProductId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    let today = Utc::now().date_naive();
    match services.stock_room.batches(id).await {
        Ok(batches) => {
            let rows: Vec<_> = batches
                .iter()
                .map(|b| {
                    json!({
                        "batch": b,
                        "state": b.state_on(today),
                        "days_until_expiry": b.days_until_expiry(today),
                    })
                })
                .collect();
            Json(rows).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn total_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ProductId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.stock_room.total_stock(id).await {
        Ok(total) => Json(json!({
            "product_id": id,
            "total_stock": total,
        }))
        .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
