use std::sync::Arc;

use serde::{Deserialize, Serialize};

use stockroom_core::UserId;

use crate::error::LookupError;
use crate::permissions::PermissionRecord;

/// A group as seen by the merge engine: its activation flag and grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupGrant {
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub permissions: Vec<PermissionRecord>,
}

fn default_active() -> bool {
    true
}

impl GroupGrant {
    pub fn new(name: impl Into<String>, permissions: Vec<PermissionRecord>) -> Self {
        Self {
            name: name.into(),
            active: true,
            permissions,
        }
    }

    #[must_use]
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}

/// Fully resolved permission view of a subject.
///
/// Produced by the persistence adapter's read-time join; `groups` keeps the
/// subject's membership order, which is the merge iteration order. Missing
/// collections deserialize as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectPermissions {
    #[serde(default)]
    pub individual: Vec<PermissionRecord>,
    #[serde(default)]
    pub groups: Vec<GroupGrant>,
}

impl SubjectPermissions {
    pub fn new(individual: Vec<PermissionRecord>, groups: Vec<GroupGrant>) -> Self {
        Self { individual, groups }
    }
}

/// Persistence boundary: load a subject with its groups joined in.
pub trait SubjectDirectory: Send + Sync {
    /// `Ok(None)` for an unknown (or deactivated) subject.
    fn load_subject(&self, subject: &UserId) -> Result<Option<SubjectPermissions>, LookupError>;
}

impl<D> SubjectDirectory for Arc<D>
where
    D: SubjectDirectory + ?Sized,
{
    fn load_subject(&self, subject: &UserId) -> Result<Option<SubjectPermissions>, LookupError> {
        (**self).load_subject(subject)
    }
}
