use axum::{Router, http::StatusCode, response::Response};

use stockroom_core::{GroupId, UserId};

use crate::app::errors;

pub mod auth;
pub mod groups;
pub mod permissions;
pub mod registry;
pub mod system;
pub mod users;

/// Endpoints behind the full authorization gate. The path segment after
/// `/api` is the route name the gate checks.
pub fn router() -> Router {
    Router::new()
        .nest("/groups", groups::router())
        .nest("/users", users::router())
        .nest("/permissions", permissions::router())
        .nest("/routes", registry::router())
        .fallback(unmatched)
}

/// Reached when the gate allowed a registered route this server has no
/// handler for.
async fn unmatched() -> Response {
    errors::json_error(StatusCode::NOT_FOUND, "resourceNotFound", "no handler for this resource")
}

pub(crate) fn parse_group_id(raw: &str) -> Result<GroupId, Response> {
    raw.parse().map_err(|_| errors::invalid_id("group"))
}

pub(crate) fn parse_user_id(raw: &str) -> Result<UserId, Response> {
    raw.parse().map_err(|_| errors::invalid_id("user"))
}
