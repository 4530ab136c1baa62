use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Extension, Path, Query},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;

use pharmatrack_core::ProductId;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

const DEFAULT_TOP_N: usize = 5;

pub fn router() -> Router {
    Router::new()
        .route("/top", get(top))
        .route("/:product_id", get(forecast))
}

pub async fn top(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::TopQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::rejection(e),
    };

    match services.forecasting.top(query.n.unwrap_or(DEFAULT_TOP_N)).await {
        Ok(names) => Json(json!({ "products": names })).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Forecast plus the insight packaging of the same run.
pub async fn forecast(
    Extension(services): Extension<Arc<AppServices>>,
    Path(product_id): Path<String>,
    query: Result<Query<dto::ForecastQuery>, QueryRejection>,
) -> axum::response::Response {
    let id: ProductId = match errors::parse_id(&product_id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::rejection(e),
    };

    let forecast = match services.forecasting.forecast(id, query.months).await {
        Ok(f) => f,
        Err(e) => return errors::service_error_to_response(e),
    };
    match services.forecasting.insight(id, query.months).await {
        Ok(insight) => Json(json!({
            "forecast": forecast,
            "insight": insight,
        }))
        .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
