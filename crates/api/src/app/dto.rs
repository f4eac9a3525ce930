use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

use stockroom_auth::{PermissionRecord, UserRole};
use stockroom_core::{ExpectedVersion, GroupId};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub permissions: Vec<PermissionRecord>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateGroupRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub permissions: Option<Vec<PermissionRecord>>,
    /// Optimistic concurrency: the version the client last read.
    pub version: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub active: bool,
    pub version: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub login: String,
    pub email: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub permissions: Vec<PermissionRecord>,
    /// Joined in the given order.
    #[serde(default)]
    pub groups: Vec<GroupId>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<UserRole>,
    pub version: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct JoinGroupRequest {
    pub group_id: GroupId,
}

/// `?domain=` on permission removal; the deployment domain when absent.
#[derive(Debug, Deserialize)]
pub struct DomainQuery {
    pub domain: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExplainQuery {
    pub route: String,
    /// Flag name (`canRead`) or HTTP method (`GET`).
    pub action: String,
    pub domain: Option<String>,
}

pub fn expected(version: Option<u64>) -> ExpectedVersion {
    ExpectedVersion::from_option(version)
}

// -------------------------
// Responses
// -------------------------

pub fn ok<T: Serialize>(status: StatusCode, data: T) -> axum::response::Response {
    (
        status,
        axum::Json(serde_json::json!({
            "success": true,
            "data": data,
        })),
    )
        .into_response()
}
