//! HTTP error response mapping.
//!
//! `RelayError` lives in `relay-core` so it can't carry an `IntoResponse`
//! impl here directly (neither type is local to this crate) — the donor hit
//! the same orphan-rule wall with its own `AppError` and solved it by
//! keeping the error type and the impl in the same crate. Here, a thin local
//! newtype stands in for that.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use relay_core::error::{ClientCode, RelayError};

pub struct ApiError(pub RelayError);

impl From<RelayError> for ApiError {
    fn from(e: RelayError) -> Self {
        Self(e)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.client_code() {
            ClientCode::BadRequest => StatusCode::BAD_REQUEST,
            ClientCode::InvalidClassroom => StatusCode::NOT_FOUND,
            ClientCode::SessionExpired => StatusCode::GONE,
            ClientCode::ProviderUnavailable => StatusCode::BAD_GATEWAY,
            ClientCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            code: self.0.client_code().as_str(),
            message: self.0.to_string(),
        };
        (status, axum::Json(body)).into_response()
    }
}
