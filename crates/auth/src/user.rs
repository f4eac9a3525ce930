//! User aggregate: account profile, ordered group membership and individual
//! permission records.
//!
//! # Invariants
//! - Email contains `@` and is stored lowercased.
//! - Group membership has no duplicates; join order is preserved.
//! - Individual permissions are unique per (route, domain).
//! - Deactivated users keep their data but cannot join groups or gain grants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{Aggregate, AggregateRoot, DomainError, DomainEvent, DomainResult, GroupId, UserId};

use crate::permissions::{PermissionKey, PermissionRecord, normalize_permissions};
use crate::roles::UserRole;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub login: String,
    pub email: String,
    pub role: UserRole,
    pub active: bool,
    pub permissions: Vec<PermissionRecord>,
    pub groups: Vec<GroupId>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: u64,
    #[serde(skip)]
    pub created: bool,
}

impl User {
    pub fn empty(id: UserId) -> Self {
        Self {
            id,
            name: String::new(),
            login: String::new(),
            email: String::new(),
            role: UserRole::default(),
            active: true,
            permissions: Vec::new(),
            groups: Vec::new(),
            created_at: None,
            updated_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn is_member_of(&self, group: GroupId) -> bool {
        self.groups.contains(&group)
    }

    pub fn has_permission_for(&self, key: &PermissionKey) -> bool {
        self.permissions
            .iter()
            .any(|p| p.matches(&key.route, &key.domain))
    }

    fn ensure_created(&self) -> DomainResult<()> {
        if !self.created {
            return Err(DomainError::not_found(format!("user {}", self.id)));
        }
        Ok(())
    }

    fn ensure_active(&self) -> DomainResult<()> {
        if !self.active {
            return Err(DomainError::invariant("user is inactive"));
        }
        Ok(())
    }
}

impl AggregateRoot for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

fn required(field: &str, value: &str) -> DomainResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    Ok(value.to_string())
}

fn normalize_email(email: &str) -> DomainResult<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(DomainError::validation("invalid email format"));
    }
    Ok(email)
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub name: String,
    pub login: String,
    pub email: String,
    pub role: UserRole,
    pub permissions: Vec<PermissionRecord>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateProfile {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<UserRole>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetUserStatus {
    pub active: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub group: GroupId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantPermission {
    pub permission: PermissionRecord,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokePermission {
    pub route: String,
    pub domain: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum UserCommand {
    Create(CreateUser),
    UpdateProfile(UpdateProfile),
    Deactivate(SetUserStatus),
    Activate(SetUserStatus),
    JoinGroup(Membership),
    LeaveGroup(Membership),
    GrantPermission(GrantPermission),
    RevokePermission(RevokePermission),
}

impl UserCommand {
    pub fn set_status(active: bool, occurred_at: DateTime<Utc>) -> Self {
        let cmd = SetUserStatus { active, occurred_at };
        if active {
            UserCommand::Activate(cmd)
        } else {
            UserCommand::Deactivate(cmd)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCreated {
    pub user_id: UserId,
    pub name: String,
    pub login: String,
    pub email: String,
    pub role: UserRole,
    pub permissions: Vec<PermissionRecord>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdated {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStatusChanged {
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipChanged {
    pub user_id: UserId,
    pub group: GroupId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGranted {
    pub user_id: UserId,
    pub permission: PermissionRecord,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRevoked {
    pub user_id: UserId,
    pub key: PermissionKey,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserEvent {
    Created(UserCreated),
    ProfileUpdated(ProfileUpdated),
    Deactivated(UserStatusChanged),
    Activated(UserStatusChanged),
    JoinedGroup(MembershipChanged),
    LeftGroup(MembershipChanged),
    PermissionGranted(PermissionGranted),
    PermissionRevoked(PermissionRevoked),
}

impl DomainEvent for UserEvent {
    fn event_type(&self) -> &'static str {
        match self {
            UserEvent::Created(_) => "auth.user.created",
            UserEvent::ProfileUpdated(_) => "auth.user.profile_updated",
            UserEvent::Deactivated(_) => "auth.user.deactivated",
            UserEvent::Activated(_) => "auth.user.activated",
            UserEvent::JoinedGroup(_) => "auth.user.joined_group",
            UserEvent::LeftGroup(_) => "auth.user.left_group",
            UserEvent::PermissionGranted(_) => "auth.user.permission_granted",
            UserEvent::PermissionRevoked(_) => "auth.user.permission_revoked",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            UserEvent::Created(e) => e.occurred_at,
            UserEvent::ProfileUpdated(e) => e.occurred_at,
            UserEvent::Deactivated(e) | UserEvent::Activated(e) => e.occurred_at,
            UserEvent::JoinedGroup(e) | UserEvent::LeftGroup(e) => e.occurred_at,
            UserEvent::PermissionGranted(e) => e.occurred_at,
            UserEvent::PermissionRevoked(e) => e.occurred_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate Implementation
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for User {
    type Command = UserCommand;
    type Event = UserEvent;

    fn apply(&mut self, event: &Self::Event) {
        let occurred_at = event.occurred_at();
        match event {
            UserEvent::Created(e) => {
                self.id = e.user_id;
                self.name = e.name.clone();
                self.login = e.login.clone();
                self.email = e.email.clone();
                self.role = e.role;
                self.permissions = e.permissions.clone();
                self.active = true;
                self.created = true;
                self.created_at = Some(occurred_at);
            }
            UserEvent::ProfileUpdated(e) => {
                self.name = e.name.clone();
                self.email = e.email.clone();
                self.role = e.role;
            }
            UserEvent::Deactivated(_) => self.active = false,
            UserEvent::Activated(_) => self.active = true,
            UserEvent::JoinedGroup(e) => self.groups.push(e.group),
            UserEvent::LeftGroup(e) => self.groups.retain(|g| *g != e.group),
            UserEvent::PermissionGranted(e) => self.permissions.push(e.permission.clone()),
            UserEvent::PermissionRevoked(e) => self
                .permissions
                .retain(|p| !p.matches(&e.key.route, &e.key.domain)),
        }
        self.updated_at = Some(occurred_at);
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> DomainResult<Vec<Self::Event>> {
        match command {
            UserCommand::Create(cmd) => self.handle_create(cmd),
            UserCommand::UpdateProfile(cmd) => self.handle_update_profile(cmd),
            UserCommand::Deactivate(cmd) | UserCommand::Activate(cmd) => self.handle_set_status(cmd),
            UserCommand::JoinGroup(cmd) => self.handle_join_group(cmd),
            UserCommand::LeaveGroup(cmd) => self.handle_leave_group(cmd),
            UserCommand::GrantPermission(cmd) => self.handle_grant(cmd),
            UserCommand::RevokePermission(cmd) => self.handle_revoke(cmd),
        }
    }
}

impl User {
    fn handle_create(&self, cmd: &CreateUser) -> DomainResult<Vec<UserEvent>> {
        if self.created {
            return Err(DomainError::invariant("user already exists"));
        }

        Ok(vec![UserEvent::Created(UserCreated {
            user_id: self.id,
            name: required("name", &cmd.name)?,
            login: required("login", &cmd.login)?,
            email: normalize_email(&cmd.email)?,
            role: cmd.role,
            permissions: normalize_permissions(cmd.permissions.clone())?,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_profile(&self, cmd: &UpdateProfile) -> DomainResult<Vec<UserEvent>> {
        self.ensure_created()?;

        let name = match &cmd.name {
            Some(name) => required("name", name)?,
            None => self.name.clone(),
        };
        let email = match &cmd.email {
            Some(email) => normalize_email(email)?,
            None => self.email.clone(),
        };

        Ok(vec![UserEvent::ProfileUpdated(ProfileUpdated {
            user_id: self.id,
            name,
            email,
            role: cmd.role.unwrap_or(self.role),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_status(&self, cmd: &SetUserStatus) -> DomainResult<Vec<UserEvent>> {
        self.ensure_created()?;

        if self.active == cmd.active {
            let state = if cmd.active { "active" } else { "inactive" };
            return Err(DomainError::invariant(format!("user already {state}")));
        }

        let e = UserStatusChanged {
            user_id: self.id,
            occurred_at: cmd.occurred_at,
        };
        Ok(vec![if cmd.active {
            UserEvent::Activated(e)
        } else {
            UserEvent::Deactivated(e)
        }])
    }

    fn handle_join_group(&self, cmd: &Membership) -> DomainResult<Vec<UserEvent>> {
        self.ensure_created()?;
        self.ensure_active()?;

        if self.is_member_of(cmd.group) {
            return Err(DomainError::conflict(format!(
                "user '{}' is already a member of group {}",
                self.login, cmd.group
            )));
        }

        Ok(vec![UserEvent::JoinedGroup(MembershipChanged {
            user_id: self.id,
            group: cmd.group,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_leave_group(&self, cmd: &Membership) -> DomainResult<Vec<UserEvent>> {
        self.ensure_created()?;

        if !self.is_member_of(cmd.group) {
            return Err(DomainError::not_found(format!(
                "membership of user '{}' in group {}",
                self.login, cmd.group
            )));
        }

        Ok(vec![UserEvent::LeftGroup(MembershipChanged {
            user_id: self.id,
            group: cmd.group,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_grant(&self, cmd: &GrantPermission) -> DomainResult<Vec<UserEvent>> {
        self.ensure_created()?;
        self.ensure_active()?;

        let permission = cmd.permission.clone().normalized();
        permission.validate()?;

        let key = permission.key();
        if self.has_permission_for(&key) {
            return Err(DomainError::conflict(format!(
                "user '{}' already has a permission for {key}",
                self.login
            )));
        }

        Ok(vec![UserEvent::PermissionGranted(PermissionGranted {
            user_id: self.id,
            permission,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_revoke(&self, cmd: &RevokePermission) -> DomainResult<Vec<UserEvent>> {
        self.ensure_created()?;

        let key = PermissionKey::new(&cmd.route, &cmd.domain);
        if !self.has_permission_for(&key) {
            return Err(DomainError::not_found(format!(
                "permission {key} of user '{}'",
                self.login
            )));
        }

        Ok(vec![UserEvent::PermissionRevoked(PermissionRevoked {
            user_id: self.id,
            key,
            occurred_at: cmd.occurred_at,
        })])
    }
}
