//! In-memory user and group directory.
//!
//! Owns the cross-aggregate rules the aggregates cannot check on their own
//! (unique names, logins and emails; permission routes present in the route
//! registry; groups referenced by users cannot be deleted) and performs the
//! read-time join that hands the merge engine a resolved subject.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

use stockroom_auth::group::{CreateGroup, GroupCommand};
use stockroom_auth::user::{CreateUser, Membership, UserCommand};
use stockroom_auth::{
    Action, Group, LookupError, MergeError, MergeExplanation, PermissionBreakdown, PermissionRecord,
    RouteRegistry, SubjectDirectory, SubjectPermissions, User, breakdown, explain,
};
use stockroom_core::{Aggregate, AggregateRoot, DomainError, DomainEvent, ExpectedVersion, GroupId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Merge(#[from] MergeError),
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

#[derive(Debug, Default)]
struct State {
    users: HashMap<UserId, User>,
    groups: HashMap<GroupId, Group>,
}

impl State {
    fn group_name_taken(&self, name: &str, except: Option<GroupId>) -> bool {
        let name = name.trim();
        self.groups
            .values()
            .any(|g| Some(g.id) != except && g.name == name)
    }

    fn login_taken(&self, login: &str, except: Option<UserId>) -> bool {
        let login = login.trim();
        self.users
            .values()
            .any(|u| Some(u.id) != except && u.login == login)
    }

    fn email_taken(&self, email: &str, except: Option<UserId>) -> bool {
        let email = email.trim().to_lowercase();
        self.users
            .values()
            .any(|u| Some(u.id) != except && u.email == email)
    }

    fn resolve(&self, user: &User) -> SubjectPermissions {
        let groups = user
            .groups
            .iter()
            .filter_map(|id| self.groups.get(id))
            .map(Group::to_grant)
            .collect();
        SubjectPermissions::new(user.permissions.clone(), groups)
    }
}

pub struct Directory {
    state: RwLock<State>,
    routes: Arc<dyn RouteRegistry>,
}

impl Directory {
    pub fn new(routes: Arc<dyn RouteRegistry>) -> Self {
        Self {
            state: RwLock::new(State::default()),
            routes,
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, LookupError> {
        self.state
            .read()
            .map_err(|_| LookupError::unavailable("directory lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, LookupError> {
        self.state
            .write()
            .map_err(|_| LookupError::unavailable("directory lock poisoned"))
    }

    /// Every record must name a (route, domain) the registry knows.
    fn ensure_routes_exist(&self, permissions: &[PermissionRecord]) -> DirectoryResult<()> {
        for p in permissions {
            if self.routes.find_route(&p.route, &p.domain)?.is_none() {
                return Err(DomainError::validation(format!(
                    "route '{}' does not exist for domain '{}'",
                    p.route.trim().to_lowercase(),
                    p.domain
                ))
                .into());
            }
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Groups
    // ─────────────────────────────────────────────────────────────────────────

    pub fn create_group(&self, cmd: CreateGroup) -> DirectoryResult<Group> {
        self.ensure_routes_exist(&cmd.permissions)?;

        let mut state = self.write()?;
        if state.group_name_taken(&cmd.name, None) {
            return Err(DomainError::conflict(format!("group name '{}' is already in use", cmd.name.trim())).into());
        }

        let mut group = Group::empty(GroupId::new());
        let events = group.execute(&GroupCommand::Create(cmd))?;
        log_events(&events);

        state.groups.insert(group.id, group.clone());
        Ok(group)
    }

    pub fn execute_group(
        &self,
        id: GroupId,
        expected: ExpectedVersion,
        command: GroupCommand,
    ) -> DirectoryResult<Group> {
        match &command {
            GroupCommand::Update(cmd) => {
                if let Some(permissions) = &cmd.permissions {
                    self.ensure_routes_exist(permissions)?;
                }
            }
            GroupCommand::AddPermission(cmd) => {
                self.ensure_routes_exist(std::slice::from_ref(&cmd.permission))?;
            }
            _ => {}
        }

        let mut state = self.write()?;
        let mut group = state
            .groups
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("group {id}")))?;
        expected.check(group.version())?;

        if let GroupCommand::Update(cmd) = &command {
            if let Some(name) = &cmd.name {
                if state.group_name_taken(name, Some(id)) {
                    return Err(DomainError::conflict(format!("group name '{}' is already in use", name.trim())).into());
                }
            }
        }

        let events = group.execute(&command)?;
        log_events(&events);

        state.groups.insert(id, group.clone());
        Ok(group)
    }

    /// Refused while any user, active or not, still references the group.
    pub fn delete_group(&self, id: GroupId) -> DirectoryResult<Group> {
        let mut state = self.write()?;
        if !state.groups.contains_key(&id) {
            return Err(DomainError::not_found(format!("group {id}")).into());
        }

        let members = state.users.values().filter(|u| u.is_member_of(id)).count();
        if members > 0 {
            return Err(DomainError::conflict(format!(
                "group is assigned to {members} user(s) and cannot be deleted"
            ))
            .into());
        }

        let removed = state
            .groups
            .remove(&id)
            .ok_or_else(|| DomainError::not_found(format!("group {id}")))?;
        tracing::info!(group_id = %id, name = %removed.name, "group deleted");
        Ok(removed)
    }

    pub fn get_group(&self, id: GroupId) -> DirectoryResult<Group> {
        let state = self.read()?;
        state
            .groups
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("group {id}")).into())
    }

    pub fn find_group_by_name(&self, name: &str) -> DirectoryResult<Option<Group>> {
        let state = self.read()?;
        let name = name.trim();
        Ok(state.groups.values().find(|g| g.name == name).cloned())
    }

    /// Groups ordered by name.
    pub fn list_groups(&self) -> DirectoryResult<Vec<Group>> {
        let state = self.read()?;
        let mut groups: Vec<Group> = state.groups.values().cloned().collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(groups)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────────

    pub fn create_user(&self, cmd: CreateUser) -> DirectoryResult<User> {
        self.create_user_in_groups(cmd, &[])
    }

    /// Create a user already joined to `groups`, in the given order.
    ///
    /// All or nothing: an unknown or repeated group leaves the directory
    /// untouched.
    pub fn create_user_in_groups(&self, cmd: CreateUser, groups: &[GroupId]) -> DirectoryResult<User> {
        self.ensure_routes_exist(&cmd.permissions)?;

        let mut state = self.write()?;
        if state.login_taken(&cmd.login, None) {
            return Err(DomainError::conflict(format!("login '{}' is already in use", cmd.login.trim())).into());
        }
        if state.email_taken(&cmd.email, None) {
            return Err(DomainError::conflict("email is already in use").into());
        }
        if let Some(missing) = groups.iter().find(|id| !state.groups.contains_key(id)) {
            return Err(DomainError::not_found(format!("group {missing}")).into());
        }

        let occurred_at = cmd.occurred_at;
        let mut user = User::empty(UserId::new());
        let mut events = user.execute(&UserCommand::Create(cmd))?;
        for &group in groups {
            events.extend(user.execute(&UserCommand::JoinGroup(Membership { group, occurred_at }))?);
        }
        log_events(&events);

        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    pub fn execute_user(
        &self,
        id: UserId,
        expected: ExpectedVersion,
        command: UserCommand,
    ) -> DirectoryResult<User> {
        if let UserCommand::GrantPermission(cmd) = &command {
            self.ensure_routes_exist(std::slice::from_ref(&cmd.permission))?;
        }

        let mut state = self.write()?;
        let mut user = state
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("user {id}")))?;
        expected.check(user.version())?;

        match &command {
            UserCommand::UpdateProfile(cmd) => {
                if let Some(email) = &cmd.email {
                    if state.email_taken(email, Some(id)) {
                        return Err(DomainError::conflict("email is already in use").into());
                    }
                }
            }
            UserCommand::JoinGroup(cmd) => {
                if !state.groups.contains_key(&cmd.group) {
                    return Err(DomainError::not_found(format!("group {}", cmd.group)).into());
                }
            }
            _ => {}
        }

        let events = user.execute(&command)?;
        log_events(&events);

        state.users.insert(id, user.clone());
        Ok(user)
    }

    pub fn get_user(&self, id: UserId) -> DirectoryResult<User> {
        let state = self.read()?;
        state
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("user {id}")).into())
    }

    pub fn find_user_by_login(&self, login: &str) -> DirectoryResult<Option<User>> {
        let state = self.read()?;
        let login = login.trim();
        Ok(state.users.values().find(|u| u.login == login).cloned())
    }

    /// Users ordered by login, deactivated ones included.
    pub fn list_users(&self) -> DirectoryResult<Vec<User>> {
        let state = self.read()?;
        let mut users: Vec<User> = state.users.values().cloned().collect();
        users.sort_by(|a, b| a.login.cmp(&b.login));
        Ok(users)
    }

    /// Individual, inherited and effective permissions of a user.
    ///
    /// Unlike [`SubjectDirectory::load_subject`], a deactivated user is still
    /// resolved here so administrators can inspect it.
    pub fn user_permissions(&self, id: UserId) -> DirectoryResult<PermissionBreakdown> {
        let state = self.read()?;
        let user = state
            .users
            .get(&id)
            .ok_or_else(|| DomainError::not_found(format!("user {id}")))?;
        Ok(breakdown(&state.resolve(user))?)
    }

    /// Merge explanation for the subject as the gate sees it.
    pub fn explain_for(
        &self,
        id: UserId,
        route: &str,
        domain: &str,
        action: Action,
    ) -> DirectoryResult<MergeExplanation> {
        let subject = self.load_subject(&id)?;
        Ok(explain(subject.as_ref(), route, domain, action))
    }
}

impl SubjectDirectory for Directory {
    fn load_subject(&self, subject: &UserId) -> Result<Option<SubjectPermissions>, LookupError> {
        let state = self.read()?;
        Ok(state
            .users
            .get(subject)
            .filter(|u| u.active)
            .map(|u| state.resolve(u)))
    }
}

fn log_events<E: DomainEvent>(events: &[E]) {
    for event in events {
        tracing::info!(
            event_type = event.event_type(),
            occurred_at = %event.occurred_at(),
            "domain event applied"
        );
    }
}
