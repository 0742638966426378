//! Consistent JSON error responses and the reason → status mapping.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use cyberbank_auth::Rejection;
use cyberbank_core::{ErrorKind, Reason};

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidRequest | ErrorKind::PinMismatch | ErrorKind::InsufficientFunds => {
            StatusCode::BAD_REQUEST
        }
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Configuration | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Map any domain/infrastructure error to a response. Internal details are
/// logged, not returned.
pub fn reason_response<E: Reason>(err: &E) -> axum::response::Response {
    let kind = err.kind();
    match kind {
        ErrorKind::Internal | ErrorKind::Configuration => {
            tracing::error!(error = %err, code = err.code(), "request failed");
            json_error(status_for(kind), err.code(), "internal error")
        }
        _ => json_error(status_for(kind), err.code(), err.to_string()),
    }
}

/// Guard rejections carry a fixed user-facing message.
pub fn rejection_response(rejection: &Rejection) -> axum::response::Response {
    json_error(status_for(rejection.kind()), rejection.code(), rejection.message())
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
