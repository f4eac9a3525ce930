use std::sync::Arc;

use axum::{Router, extract::Extension, http::StatusCode, routing::get};

use stockroom_auth::RouteRegistry;

use crate::app::{dto, errors, services::AppServices};

pub fn router() -> Router {
    Router::new().route("/", get(list_routes))
}

/// GET /api/routes - the route capability table.
pub async fn list_routes(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.routes.list_routes() {
        Ok(routes) => dto::ok(StatusCode::OK, routes),
        Err(e) => errors::directory_error_to_response(e.into()),
    }
}
