use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/:batch_code", get(reminders))
}

pub async fn reminders(
    Extension(services): Extension<Arc<AppServices>>,
    Path(batch_code): Path<String>,
) -> axum::response::Response {
    match services.recall.reminders_for(&batch_code).await {
        Ok(reminders) => Json(reminders).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
