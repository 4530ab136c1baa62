use std::str::FromStr;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use pharmatrack_ai::AiError;
use pharmatrack_core::DomainError;
use pharmatrack_infra::ServiceError;

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        ServiceError::Domain(e) => domain_error_to_response(e),
        ServiceError::UnknownProduct(_) => json_error(StatusCode::NOT_FOUND, "unknown_product", message),
        ServiceError::UnknownBatch(_) => json_error(StatusCode::NOT_FOUND, "unknown_batch", message),
        ServiceError::InsufficientStock { .. } => {
            json_error(StatusCode::CONFLICT, "insufficient_stock", message)
        }
        ServiceError::StaleBatchState { .. } => {
            json_error(StatusCode::CONFLICT, "stale_batch_state", message)
        }
        ServiceError::Conflict(_) => json_error(StatusCode::CONFLICT, "conflict", message),
        ServiceError::Forecast(AiError::InvalidInput(_)) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", message)
        }
        ServiceError::Forecast(AiError::InsufficientHistory { .. }) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "insufficient_history", message)
        }
        ServiceError::Forecast(_) => {
            tracing::error!(error = %message, "forecast failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "forecast_error", message)
        }
        ServiceError::Store(_) => {
            tracing::error!(error = %message, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", message)
        }
    }
}

fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        DomainError::InvalidQuantity(_) => json_error(StatusCode::BAD_REQUEST, "invalid_quantity", message),
        DomainError::Validation(_) => json_error(StatusCode::BAD_REQUEST, "validation_error", message),
        DomainError::InvalidId(_) => json_error(StatusCode::BAD_REQUEST, "invalid_id", message),
        DomainError::InvariantViolation(_) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", message)
        }
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", message),
        DomainError::Conflict(_) => json_error(StatusCode::CONFLICT, "conflict", message),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse a typed id from a path segment.
pub fn parse_id<T>(raw: &str) -> Result<T, axum::response::Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse::<T>()
        .map_err(|e| json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()))
}

/// Malformed JSON bodies and query strings share the validation error shape.
pub fn rejection(err: impl std::fmt::Display) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", err.to_string())
}
