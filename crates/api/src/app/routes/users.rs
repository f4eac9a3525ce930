use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{delete, get, patch, post},
};
use chrono::Utc;

use stockroom_auth::PermissionRecord;
use stockroom_auth::user::{CreateUser, GrantPermission, Membership, RevokePermission, UpdateProfile, UserCommand};
use stockroom_core::ExpectedVersion;

use crate::app::routes::{parse_group_id, parse_user_id};
use crate::app::{dto, errors, services::AppServices};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user).patch(update_user).delete(deactivate_user))
        .route("/:id/status", patch(set_status))
        .route("/:id/groups", post(join_group))
        .route("/:id/groups/:group_id", delete(leave_group))
        .route("/:id/permissions", get(user_permissions).post(grant_permission))
        .route("/:id/permissions/:route", delete(revoke_permission))
}

pub async fn list_users(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.directory.list_users() {
        Ok(users) => dto::ok(StatusCode::OK, users),
        Err(e) => errors::directory_error_to_response(e),
    }
}

/// POST /api/users - create the account already joined to the listed groups.
pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateUserRequest>,
) -> axum::response::Response {
    let cmd = CreateUser {
        name: body.name,
        login: body.login,
        email: body.email,
        role: body.role,
        permissions: body.permissions,
        occurred_at: Utc::now(),
    };

    match services.directory.create_user_in_groups(cmd, &body.groups) {
        Ok(user) => dto::ok(StatusCode::CREATED, user),
        Err(e) => errors::directory_error_to_response(e),
    }
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_user_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.directory.get_user(id) {
        Ok(user) => dto::ok(StatusCode::OK, user),
        Err(e) => errors::directory_error_to_response(e),
    }
}

pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateUserRequest>,
) -> axum::response::Response {
    let id = match parse_user_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let cmd = UserCommand::UpdateProfile(UpdateProfile {
        name: body.name,
        email: body.email,
        role: body.role,
        occurred_at: Utc::now(),
    });

    match services.directory.execute_user(id, dto::expected(body.version), cmd) {
        Ok(user) => dto::ok(StatusCode::OK, user),
        Err(e) => errors::directory_error_to_response(e),
    }
}

/// DELETE /api/users/:id - soft delete: the account is deactivated, not removed.
pub async fn deactivate_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_user_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let cmd = UserCommand::set_status(false, Utc::now());
    match services.directory.execute_user(id, ExpectedVersion::Any, cmd) {
        Ok(user) => dto::ok(StatusCode::OK, user),
        Err(e) => errors::directory_error_to_response(e),
    }
}

pub async fn set_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::StatusRequest>,
) -> axum::response::Response {
    let id = match parse_user_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let cmd = UserCommand::set_status(body.active, Utc::now());
    match services.directory.execute_user(id, dto::expected(body.version), cmd) {
        Ok(user) => dto::ok(StatusCode::OK, user),
        Err(e) => errors::directory_error_to_response(e),
    }
}

pub async fn join_group(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::JoinGroupRequest>,
) -> axum::response::Response {
    let id = match parse_user_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let cmd = UserCommand::JoinGroup(Membership {
        group: body.group_id,
        occurred_at: Utc::now(),
    });
    match services.directory.execute_user(id, ExpectedVersion::Any, cmd) {
        Ok(user) => dto::ok(StatusCode::OK, user),
        Err(e) => errors::directory_error_to_response(e),
    }
}

pub async fn leave_group(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, group_id)): Path<(String, String)>,
) -> axum::response::Response {
    let id = match parse_user_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let group = match parse_group_id(&group_id) {
        Ok(group) => group,
        Err(resp) => return resp,
    };

    let cmd = UserCommand::LeaveGroup(Membership {
        group,
        occurred_at: Utc::now(),
    });
    match services.directory.execute_user(id, ExpectedVersion::Any, cmd) {
        Ok(user) => dto::ok(StatusCode::OK, user),
        Err(e) => errors::directory_error_to_response(e),
    }
}

/// GET /api/users/:id/permissions - individual, inherited and effective records.
pub async fn user_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_user_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.directory.user_permissions(id) {
        Ok(breakdown) => dto::ok(StatusCode::OK, breakdown),
        Err(e) => errors::directory_error_to_response(e),
    }
}

pub async fn grant_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(permission): Json<PermissionRecord>,
) -> axum::response::Response {
    let id = match parse_user_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let cmd = UserCommand::GrantPermission(GrantPermission {
        permission,
        occurred_at: Utc::now(),
    });
    match services.directory.execute_user(id, ExpectedVersion::Any, cmd) {
        Ok(user) => dto::ok(StatusCode::CREATED, user),
        Err(e) => errors::directory_error_to_response(e),
    }
}

pub async fn revoke_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, route)): Path<(String, String)>,
    Query(query): Query<dto::DomainQuery>,
) -> axum::response::Response {
    let id = match parse_user_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let cmd = UserCommand::RevokePermission(RevokePermission {
        route,
        domain: query
            .domain
            .unwrap_or_else(|| services.default_domain().to_string()),
        occurred_at: Utc::now(),
    });
    match services.directory.execute_user(id, ExpectedVersion::Any, cmd) {
        Ok(user) => dto::ok(StatusCode::OK, user),
        Err(e) => errors::directory_error_to_response(e),
    }
}
