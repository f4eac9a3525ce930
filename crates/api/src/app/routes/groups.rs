use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{delete, get, patch, post},
};
use chrono::Utc;

use stockroom_auth::PermissionRecord;
use stockroom_auth::group::{
    AddGroupPermission, CreateGroup, GroupCommand, RemoveGroupPermission, SetGroupStatus, UpdateGroup,
};
use stockroom_core::ExpectedVersion;

use crate::app::routes::parse_group_id;
use crate::app::{dto, errors, services::AppServices};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_groups).post(create_group))
        .route("/:id", get(get_group).patch(update_group).delete(delete_group))
        .route("/:id/status", patch(set_status))
        .route("/:id/permissions", post(add_permission))
        .route("/:id/permissions/:route", delete(remove_permission))
}

pub async fn list_groups(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.directory.list_groups() {
        Ok(groups) => dto::ok(StatusCode::OK, groups),
        Err(e) => errors::directory_error_to_response(e),
    }
}

pub async fn create_group(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateGroupRequest>,
) -> axum::response::Response {
    let cmd = CreateGroup {
        name: body.name,
        description: body.description,
        permissions: body.permissions,
        occurred_at: Utc::now(),
    };

    match services.directory.create_group(cmd) {
        Ok(group) => dto::ok(StatusCode::CREATED, group),
        Err(e) => errors::directory_error_to_response(e),
    }
}

pub async fn get_group(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_group_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.directory.get_group(id) {
        Ok(group) => dto::ok(StatusCode::OK, group),
        Err(e) => errors::directory_error_to_response(e),
    }
}

pub async fn update_group(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateGroupRequest>,
) -> axum::response::Response {
    let id = match parse_group_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let cmd = GroupCommand::Update(UpdateGroup {
        name: body.name,
        description: body.description,
        permissions: body.permissions,
        occurred_at: Utc::now(),
    });

    match services.directory.execute_group(id, dto::expected(body.version), cmd) {
        Ok(group) => dto::ok(StatusCode::OK, group),
        Err(e) => errors::directory_error_to_response(e),
    }
}

/// DELETE /api/groups/:id - refused with 409 while users reference the group.
pub async fn delete_group(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_group_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.directory.delete_group(id) {
        Ok(group) => dto::ok(StatusCode::OK, group),
        Err(e) => errors::directory_error_to_response(e),
    }
}

pub async fn set_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::StatusRequest>,
) -> axum::response::Response {
    let id = match parse_group_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let cmd = GroupCommand::SetStatus(SetGroupStatus {
        active: body.active,
        occurred_at: Utc::now(),
    });

    match services.directory.execute_group(id, dto::expected(body.version), cmd) {
        Ok(group) => dto::ok(StatusCode::OK, group),
        Err(e) => errors::directory_error_to_response(e),
    }
}

pub async fn add_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(permission): Json<PermissionRecord>,
) -> axum::response::Response {
    let id = match parse_group_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let cmd = GroupCommand::AddPermission(AddGroupPermission {
        permission,
        occurred_at: Utc::now(),
    });

    match services.directory.execute_group(id, ExpectedVersion::Any, cmd) {
        Ok(group) => dto::ok(StatusCode::CREATED, group),
        Err(e) => errors::directory_error_to_response(e),
    }
}

pub async fn remove_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, route)): Path<(String, String)>,
    Query(query): Query<dto::DomainQuery>,
) -> axum::response::Response {
    let id = match parse_group_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let cmd = GroupCommand::RemovePermission(RemoveGroupPermission {
        route,
        domain: query
            .domain
            .unwrap_or_else(|| services.default_domain().to_string()),
        occurred_at: Utc::now(),
    });

    match services.directory.execute_group(id, ExpectedVersion::Any, cmd) {
        Ok(group) => dto::ok(StatusCode::OK, group),
        Err(e) => errors::directory_error_to_response(e),
    }
}
