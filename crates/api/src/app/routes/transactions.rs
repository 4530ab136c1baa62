use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Extension, Query},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(recent))
        .route("/count", get(count))
}

/// Newest first; `limit` defaults to 200.
pub async fn recent(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::LedgerQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::rejection(e),
    };

    match services.ledger.recent(query.limit).await {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn count(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.ledger.count().await {
        Ok(total) => Json(json!({ "count": total })).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
