//! Startup seeding: the built-in route table and the optional administrator.

use chrono::{DateTime, Utc};

use stockroom_auth::group::CreateGroup;
use stockroom_auth::user::{CreateUser, Membership, UserCommand};
use stockroom_auth::{Action, ActionFlags, Group, PermissionRecord, RouteDefinition, RouteRegistry, User, UserRole};
use stockroom_core::ExpectedVersion;

use crate::config::BootstrapConfig;
use crate::directory::{Directory, DirectoryResult};

/// Routes served by the administration API plus the inventory resources.
pub fn default_routes(domain: &str) -> Vec<RouteDefinition> {
    let full = ["groups", "users", "produtos", "fornecedores", "movimentacoes"];
    let read_only = ["permissions", "routes", "logs", "relatorios", "dashboard"];

    full.iter()
        .map(|route| RouteDefinition::new(route, domain))
        .chain(read_only.iter().map(|route| {
            RouteDefinition::new(route, domain).with_actions(ActionFlags::only(&[Action::Read]))
        }))
        .collect()
}

#[derive(Debug, Clone)]
pub struct BootstrapOutcome {
    pub group: Group,
    pub user: User,
    pub created_group: bool,
    pub created_user: bool,
}

/// Ensure the administrator group and account exist.
///
/// The group receives every flag on every registered route. Existing records
/// are left untouched, so running this on every start is safe.
pub fn ensure_administrator(
    directory: &Directory,
    routes: &dyn RouteRegistry,
    config: &BootstrapConfig,
    now: DateTime<Utc>,
) -> DirectoryResult<BootstrapOutcome> {
    let (group, created_group) = match directory.find_group_by_name(&config.admin_group)? {
        Some(group) => (group, false),
        None => {
            let permissions = routes
                .list_routes()?
                .iter()
                .map(|r| PermissionRecord::new(&r.route, &r.domain).with_actions(ActionFlags::ALL))
                .collect();
            let group = directory.create_group(CreateGroup {
                name: config.admin_group.clone(),
                description: "Full access to every registered route".to_string(),
                permissions,
                occurred_at: now,
            })?;
            (group, true)
        }
    };

    let (mut user, created_user) = match directory.find_user_by_login(&config.admin_login)? {
        Some(user) => (user, false),
        None => {
            let user = directory.create_user(CreateUser {
                name: config.admin_name.clone(),
                login: config.admin_login.clone(),
                email: config.admin_email.clone(),
                role: UserRole::Administrator,
                permissions: vec![],
                occurred_at: now,
            })?;
            (user, true)
        }
    };

    if !user.is_member_of(group.id) && user.active {
        user = directory.execute_user(
            user.id,
            ExpectedVersion::Exact(user.version),
            UserCommand::JoinGroup(Membership {
                group: group.id,
                occurred_at: now,
            }),
        )?;
    }

    tracing::info!(
        group = %group.name,
        login = %user.login,
        user_id = %user.id,
        created_group,
        created_user,
        "administrator bootstrap complete"
    );

    Ok(BootstrapOutcome {
        group,
        user,
        created_group,
        created_user,
    })
}
