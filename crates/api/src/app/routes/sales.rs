use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(sell))
        .route("/recommendation", get(recommend))
}

pub fn returns_router() -> Router {
    Router::new().route("/", post(accept_return))
}

/// FEFO preview; nothing is written.
pub async fn recommend(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::RecommendationQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::rejection(e),
    };

    let on = query.on.unwrap_or_else(|| Utc::now().date_naive());
    match services
        .sales_desk
        .recommend(&query.product, query.quantity, on)
        .await
    {
        Ok(rec) => Json(rec).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn sell(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::SaleBody>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::rejection(e),
    };

    match services.sales_desk.sell(body.into_request(Utc::now())).await {
        Ok(receipt) => (StatusCode::CREATED, Json(receipt)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn accept_return(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::ReturnBody>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::rejection(e),
    };

    match services.sales_desk.accept_return(body.into_request(Utc::now())).await {
        Ok(receipt) => (StatusCode::CREATED, Json(receipt)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
