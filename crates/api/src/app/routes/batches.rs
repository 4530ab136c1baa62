use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::Utc;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/", post(receive_stock))
}

/// Stock-in of a new batch.
pub async fn receive_stock(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::StockInBody>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::rejection(e),
    };

    match services.stock_room.receive_stock(body.into_request(Utc::now())).await {
        Ok(receipt) => (StatusCode::CREATED, Json(receipt)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
