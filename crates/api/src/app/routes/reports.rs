use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Extension, Query},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/expiry-risk", get(expiry_risk))
}

pub async fn expiry_risk(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::ExpiryRiskQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::rejection(e),
    };

    let today = query.today.unwrap_or_else(|| Utc::now().date_naive());
    match services.stock_room.expiry_risk(today, query.days).await {
        Ok(alerts) => Json(alerts).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
