//! API error types with HTTP response mapping.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;
use store::StoreError;

use crate::envelope::Envelope;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// No authenticated user on the request.
    Unauthorized(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Error from the checkout layer.
    Checkout(CheckoutError),
    /// Internal server error.
    Internal(String),
}

const INTERNAL_MESSAGE: &str = "Internal server error";

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string())
            }
        };

        (status, Json(Envelope::error(message))).into_response()
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, String) {
    match err {
        CheckoutError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
        CheckoutError::Store(store_err) => store_error_to_response(store_err),
        CheckoutError::Gateway(gateway_err) => {
            tracing::error!(error = %gateway_err, "payment gateway error");
            (
                StatusCode::BAD_GATEWAY,
                "Payment provider request failed".to_string(),
            )
        }
        err @ CheckoutError::OrderNotRecorded { .. } => {
            tracing::error!(error = %err, "checkout order not recorded");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                INTERNAL_MESSAGE.to_string(),
            )
        }
    }
}

fn store_error_to_response(err: StoreError) -> (StatusCode, String) {
    match err {
        StoreError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
        StoreError::InvalidState(msg) => (StatusCode::CONFLICT, msg),
        StoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
        StoreError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{what} not found")),
        err => {
            tracing::error!(error = %err, "store error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                INTERNAL_MESSAGE.to_string(),
            )
        }
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Checkout(CheckoutError::Store(err))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkout::GatewayError;

    fn status_of(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_store_errors_map_to_status_codes() {
        assert_eq!(
            status_of(StoreError::Validation("bad".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(StoreError::InvalidState("mixed".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(StoreError::Forbidden("other user".into())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(StoreError::NotFound("Cart 7".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(StoreError::Unavailable("down".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_checkout_errors_map_to_status_codes() {
        assert_eq!(
            status_of(CheckoutError::Validation("empty".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(CheckoutError::Gateway(GatewayError::Unavailable(
                "declined".into()
            ))),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(CheckoutError::OrderNotRecorded {
                session_id: "cs_1".into(),
                source: StoreError::Unavailable("down".into()),
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(ApiError::Unauthorized("no user".into())),
            StatusCode::UNAUTHORIZED
        );
    }
}
