//! Session endpoints: authenticated, but not gated by route permissions.

use std::sync::Arc;

use axum::{
    Router,
    extract::Extension,
    http::StatusCode,
    routing::get,
};

use crate::app::{dto, errors, services::AppServices};
use crate::context::SubjectContext;

pub fn router() -> Router {
    Router::new().route("/me", get(me))
}

/// GET /api/auth/me - the authenticated subject and, when known, its account.
pub async fn me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(subject): Extension<SubjectContext>,
) -> axum::response::Response {
    let account = match services.directory.get_user(subject.subject()) {
        Ok(user) => Some(user),
        Err(stockroom_infra::DirectoryError::Domain(stockroom_core::DomainError::NotFound(_))) => None,
        Err(e) => return errors::directory_error_to_response(e),
    };

    dto::ok(
        StatusCode::OK,
        serde_json::json!({
            "subject": subject.identity(),
            "account": account,
        }),
    )
}
