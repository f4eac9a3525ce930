//! Caller-facing permission introspection.
//!
//! Answers "what can I do?" and "why was this allowed/denied?" for the
//! authenticated subject.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Query},
    http::StatusCode,
    routing::get,
};

use stockroom_auth::Action;

use crate::app::{dto, errors, services::AppServices};
use crate::context::SubjectContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(my_permissions))
        .route("/explain", get(explain))
}

/// GET /api/permissions
pub async fn my_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(subject): Extension<SubjectContext>,
) -> axum::response::Response {
    match services.directory.user_permissions(subject.subject()) {
        Ok(breakdown) => dto::ok(StatusCode::OK, breakdown),
        Err(e) => errors::directory_error_to_response(e),
    }
}

/// GET /api/permissions/explain?route=&action=[&domain=]
pub async fn explain(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(subject): Extension<SubjectContext>,
    Query(query): Query<dto::ExplainQuery>,
) -> axum::response::Response {
    let Some(action) = Action::parse(&query.action) else {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validationError",
            format!("unknown action '{}'", query.action),
        );
    };
    let domain = query
        .domain
        .unwrap_or_else(|| services.default_domain().to_string());

    match services
        .directory
        .explain_for(subject.subject(), &query.route, &domain, action)
    {
        Ok(explanation) => dto::ok(StatusCode::OK, explanation),
        Err(e) => errors::directory_error_to_response(e),
    }
}
