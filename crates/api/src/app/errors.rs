use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockroom_auth::Denial;
use stockroom_core::DomainError;
use stockroom_infra::DirectoryError;

pub fn json_error(status: StatusCode, kind: &'static str, message: impl Into<String>) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "success": false,
            "type": kind,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Gate denial with its own status code and internal reason.
pub fn denial_to_response(denial: &Denial) -> axum::response::Response {
    let status = StatusCode::from_u16(denial.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        axum::Json(json!({
            "success": false,
            "type": denial.kind,
            "message": denial.message,
            "reason": denial.reason,
        })),
    )
        .into_response()
}

pub fn directory_error_to_response(err: DirectoryError) -> axum::response::Response {
    match err {
        DirectoryError::Domain(e) => domain_error_to_response(e),
        DirectoryError::Lookup(e) => {
            tracing::error!(error = %e, "directory lookup failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "serverError", "internal error")
        }
        DirectoryError::Merge(e) => {
            tracing::error!(error = %e, "permission merge failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "serverError", "internal error")
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validationError", msg)
        }
        DomainError::InvariantViolation(msg) => json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariantViolation", msg),
        DomainError::NotFound(what) => json_error(StatusCode::NOT_FOUND, "resourceNotFound", format!("{what} not found")),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
    }
}

pub fn invalid_id(what: &str) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "validationError", format!("invalid {what} id"))
}
