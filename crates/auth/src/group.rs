//! Group aggregate: a named, switchable bundle of permission records.
//!
//! Users inherit a group's records while the group is active. Cross-aggregate
//! rules (unique names, routes existing in the registry, refusing to delete a
//! referenced group) belong to the directory, not to this module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{Aggregate, AggregateRoot, DomainError, DomainEvent, DomainResult, GroupId};

use crate::permissions::{PermissionKey, PermissionRecord, normalize_permissions};
use crate::subject::GroupGrant;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub description: String,
    pub active: bool,
    pub permissions: Vec<PermissionRecord>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: u64,
    #[serde(skip)]
    pub created: bool,
}

impl Group {
    pub fn empty(id: GroupId) -> Self {
        Self {
            id,
            name: String::new(),
            description: String::new(),
            active: true,
            permissions: Vec::new(),
            created_at: None,
            updated_at: None,
            version: 0,
            created: false,
        }
    }

    /// The merge engine's view of this group.
    pub fn to_grant(&self) -> GroupGrant {
        GroupGrant::new(self.name.clone(), self.permissions.clone()).with_active(self.active)
    }

    pub fn has_permission_for(&self, key: &PermissionKey) -> bool {
        self.permissions
            .iter()
            .any(|p| p.matches(&key.route, &key.domain))
    }

    fn ensure_created(&self) -> DomainResult<()> {
        if !self.created {
            return Err(DomainError::not_found(format!("group {}", self.id)));
        }
        Ok(())
    }
}

impl AggregateRoot for Group {
    type Id = GroupId;

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

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGroup {
    pub name: String,
    pub description: String,
    pub permissions: Vec<PermissionRecord>,
    pub occurred_at: DateTime<Utc>,
}

/// Partial update; `permissions` replaces the list wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateGroup {
    pub name: Option<String>,
    pub description: Option<String>,
    pub permissions: Option<Vec<PermissionRecord>>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddGroupPermission {
    pub permission: PermissionRecord,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveGroupPermission {
    pub route: String,
    pub domain: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetGroupStatus {
    pub active: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GroupCommand {
    Create(CreateGroup),
    Update(UpdateGroup),
    AddPermission(AddGroupPermission),
    RemovePermission(RemoveGroupPermission),
    SetStatus(SetGroupStatus),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCreated {
    pub group_id: GroupId,
    pub name: String,
    pub description: String,
    pub permissions: Vec<PermissionRecord>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupUpdated {
    pub group_id: GroupId,
    pub name: String,
    pub description: String,
    pub permissions: Vec<PermissionRecord>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPermissionAdded {
    pub group_id: GroupId,
    pub permission: PermissionRecord,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPermissionRemoved {
    pub group_id: GroupId,
    pub key: PermissionKey,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupStatusChanged {
    pub group_id: GroupId,
    pub active: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupEvent {
    Created(GroupCreated),
    Updated(GroupUpdated),
    PermissionAdded(GroupPermissionAdded),
    PermissionRemoved(GroupPermissionRemoved),
    StatusChanged(GroupStatusChanged),
}

impl DomainEvent for GroupEvent {
    fn event_type(&self) -> &'static str {
        match self {
            GroupEvent::Created(_) => "auth.group.created",
            GroupEvent::Updated(_) => "auth.group.updated",
            GroupEvent::PermissionAdded(_) => "auth.group.permission_added",
            GroupEvent::PermissionRemoved(_) => "auth.group.permission_removed",
            GroupEvent::StatusChanged(_) => "auth.group.status_changed",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            GroupEvent::Created(e) => e.occurred_at,
            GroupEvent::Updated(e) => e.occurred_at,
            GroupEvent::PermissionAdded(e) => e.occurred_at,
            GroupEvent::PermissionRemoved(e) => e.occurred_at,
            GroupEvent::StatusChanged(e) => e.occurred_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate Implementation
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for Group {
    type Command = GroupCommand;
    type Event = GroupEvent;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            GroupEvent::Created(e) => {
                self.id = e.group_id;
                self.name = e.name.clone();
                self.description = e.description.clone();
                self.permissions = e.permissions.clone();
                self.active = true;
                self.created = true;
                self.created_at = Some(e.occurred_at);
                self.updated_at = Some(e.occurred_at);
            }
            GroupEvent::Updated(e) => {
                self.name = e.name.clone();
                self.description = e.description.clone();
                self.permissions = e.permissions.clone();
                self.updated_at = Some(e.occurred_at);
            }
            GroupEvent::PermissionAdded(e) => {
                self.permissions.push(e.permission.clone());
                self.updated_at = Some(e.occurred_at);
            }
            GroupEvent::PermissionRemoved(e) => {
                self.permissions
                    .retain(|p| !p.matches(&e.key.route, &e.key.domain));
                self.updated_at = Some(e.occurred_at);
            }
            GroupEvent::StatusChanged(e) => {
                self.active = e.active;
                self.updated_at = Some(e.occurred_at);
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> DomainResult<Vec<Self::Event>> {
        match command {
            GroupCommand::Create(cmd) => self.handle_create(cmd),
            GroupCommand::Update(cmd) => self.handle_update(cmd),
            GroupCommand::AddPermission(cmd) => self.handle_add_permission(cmd),
            GroupCommand::RemovePermission(cmd) => self.handle_remove_permission(cmd),
            GroupCommand::SetStatus(cmd) => self.handle_set_status(cmd),
        }
    }
}

impl Group {
    fn handle_create(&self, cmd: &CreateGroup) -> DomainResult<Vec<GroupEvent>> {
        if self.created {
            return Err(DomainError::invariant("group already exists"));
        }

        Ok(vec![GroupEvent::Created(GroupCreated {
            group_id: self.id,
            name: required("group name", &cmd.name)?,
            description: required("group description", &cmd.description)?,
            permissions: normalize_permissions(cmd.permissions.clone())?,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateGroup) -> DomainResult<Vec<GroupEvent>> {
        self.ensure_created()?;

        let name = match &cmd.name {
            Some(name) => required("group name", name)?,
            None => self.name.clone(),
        };
        let description = match &cmd.description {
            Some(description) => required("group description", description)?,
            None => self.description.clone(),
        };
        let permissions = match &cmd.permissions {
            Some(permissions) => normalize_permissions(permissions.clone())?,
            None => self.permissions.clone(),
        };

        Ok(vec![GroupEvent::Updated(GroupUpdated {
            group_id: self.id,
            name,
            description,
            permissions,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_permission(&self, cmd: &AddGroupPermission) -> DomainResult<Vec<GroupEvent>> {
        self.ensure_created()?;

        let permission = cmd.permission.clone().normalized();
        permission.validate()?;

        let key = permission.key();
        if self.has_permission_for(&key) {
            return Err(DomainError::conflict(format!(
                "group '{}' already has a permission for {key}",
                self.name
            )));
        }

        Ok(vec![GroupEvent::PermissionAdded(GroupPermissionAdded {
            group_id: self.id,
            permission,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_permission(&self, cmd: &RemoveGroupPermission) -> DomainResult<Vec<GroupEvent>> {
        self.ensure_created()?;

        let key = PermissionKey::new(&cmd.route, &cmd.domain);
        if !self.has_permission_for(&key) {
            return Err(DomainError::not_found(format!(
                "permission {key} in group '{}'",
                self.name
            )));
        }

        Ok(vec![GroupEvent::PermissionRemoved(GroupPermissionRemoved {
            group_id: self.id,
            key,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_status(&self, cmd: &SetGroupStatus) -> DomainResult<Vec<GroupEvent>> {
        self.ensure_created()?;

        if self.active == cmd.active {
            let state = if cmd.active { "active" } else { "inactive" };
            return Err(DomainError::invariant(format!("group already {state}")));
        }

        Ok(vec![GroupEvent::StatusChanged(GroupStatusChanged {
            group_id: self.id,
            active: cmd.active,
            occurred_at: cmd.occurred_at,
        })])
    }
}
