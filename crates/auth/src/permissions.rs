use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};

use stockroom_core::{DomainError, DomainResult};

use crate::action::{Action, ActionFlags};

/// Domain assumed when a record does not name one.
pub const DEFAULT_DOMAIN: &str = "localhost";

/// Canonical form of a route name: trimmed and lowercased.
pub fn normalize_route(route: &str) -> String {
    route.trim().to_lowercase()
}

fn default_domain() -> String {
    DEFAULT_DOMAIN.to_string()
}

fn default_active() -> bool {
    true
}

fn deserialize_route<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(normalize_route(&raw))
}

/// Uniqueness key of a record inside its owning collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermissionKey {
    pub route: String,
    pub domain: String,
}

impl PermissionKey {
    pub fn new(route: &str, domain: &str) -> Self {
        Self {
            route: normalize_route(route),
            domain: domain.to_string(),
        }
    }
}

impl core::fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}@{}", self.route, self.domain)
    }
}

/// A (route, domain) grant with five action flags and an activation switch.
///
/// Owned by a user or a group; has no identity of its own. The route is
/// stored in canonical lowercase, the domain verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    #[serde(deserialize_with = "deserialize_route")]
    pub route: String,
    #[serde(default = "default_domain")]
    pub domain: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(flatten)]
    pub actions: ActionFlags,
}

impl PermissionRecord {
    /// Active record with every flag cleared.
    pub fn new(route: &str, domain: &str) -> Self {
        Self {
            route: normalize_route(route),
            domain: domain.to_string(),
            active: true,
            actions: ActionFlags::NONE,
        }
    }

    #[must_use]
    pub fn grant(mut self, action: Action) -> Self {
        self.actions = self.actions.with(action, true);
        self
    }

    #[must_use]
    pub fn deny(mut self, action: Action) -> Self {
        self.actions = self.actions.with(action, false);
        self
    }

    #[must_use]
    pub fn with_actions(mut self, actions: ActionFlags) -> Self {
        self.actions = actions;
        self
    }

    #[must_use]
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn key(&self) -> PermissionKey {
        PermissionKey {
            route: self.route.clone(),
            domain: self.domain.clone(),
        }
    }

    pub fn matches(&self, route: &str, domain: &str) -> bool {
        self.route == route && self.domain == domain
    }

    /// Active and the flag for `action` is set.
    pub fn permits(&self, action: Action) -> bool {
        self.active && self.actions.allows(action)
    }

    /// Canonicalize the route in place (records built by hand may skip it).
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.route = normalize_route(&self.route);
        self
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.route.trim().is_empty() {
            return Err(DomainError::validation("permission route cannot be empty"));
        }
        if self.domain.trim().is_empty() {
            return Err(DomainError::validation(format!(
                "permission domain for route '{}' cannot be empty",
                self.route
            )));
        }
        Ok(())
    }
}

/// Validate an owning collection: every record well-formed, (route, domain)
/// unique.
pub fn validate_permissions(records: &[PermissionRecord]) -> DomainResult<()> {
    let mut seen: HashSet<PermissionKey> = HashSet::with_capacity(records.len());
    for record in records {
        record.validate()?;
        let key = PermissionKey::new(&record.route, &record.domain);
        if !seen.insert(key.clone()) {
            return Err(DomainError::validation(format!(
                "duplicate permission for {key}: route + domain must be unique"
            )));
        }
    }
    Ok(())
}

/// Normalize every record, then validate the collection.
pub fn normalize_permissions(records: Vec<PermissionRecord>) -> DomainResult<Vec<PermissionRecord>> {
    let records: Vec<PermissionRecord> = records.into_iter().map(PermissionRecord::normalized).collect();
    validate_permissions(&records)?;
    Ok(records)
}
