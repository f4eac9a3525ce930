//! Actions, verb mapping and the five-flag capability record.
//!
//! The same [`ActionFlags`] record is carried by subject permissions and by
//! route definitions; the verb table lives here so that "unknown action" is
//! simply an unrepresentable value.

use serde::{Deserialize, Serialize};

/// One of the five operations a permission can grant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "canRead")]
    Read,
    #[serde(rename = "canCreate")]
    Create,
    #[serde(rename = "canReplace")]
    Replace,
    #[serde(rename = "canModify")]
    Modify,
    #[serde(rename = "canDelete")]
    Delete,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Read,
        Action::Create,
        Action::Replace,
        Action::Modify,
        Action::Delete,
    ];

    /// Map an HTTP method name to its action.
    ///
    /// GET→read, POST→create, PUT→replace, PATCH→modify, DELETE→delete.
    /// Anything else (HEAD, OPTIONS, TRACE, ...) has no action.
    pub fn for_method(method: &str) -> Option<Action> {
        let method = method.trim();
        if method.eq_ignore_ascii_case("GET") {
            Some(Action::Read)
        } else if method.eq_ignore_ascii_case("POST") {
            Some(Action::Create)
        } else if method.eq_ignore_ascii_case("PUT") {
            Some(Action::Replace)
        } else if method.eq_ignore_ascii_case("PATCH") {
            Some(Action::Modify)
        } else if method.eq_ignore_ascii_case("DELETE") {
            Some(Action::Delete)
        } else {
            None
        }
    }

    /// Field name of the flag in the persisted shape.
    pub fn flag_name(self) -> &'static str {
        match self {
            Action::Read => "canRead",
            Action::Create => "canCreate",
            Action::Replace => "canReplace",
            Action::Modify => "canModify",
            Action::Delete => "canDelete",
        }
    }

    pub fn method(self) -> &'static str {
        match self {
            Action::Read => "GET",
            Action::Create => "POST",
            Action::Replace => "PUT",
            Action::Modify => "PATCH",
            Action::Delete => "DELETE",
        }
    }

    /// Parse either a flag name (`canRead`) or a method name (`GET`).
    pub fn parse(s: &str) -> Option<Action> {
        let s = s.trim();
        Action::ALL
            .into_iter()
            .find(|a| a.flag_name().eq_ignore_ascii_case(s))
            .or_else(|| Action::for_method(s))
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.flag_name())
    }
}

/// Five independent booleans, one per [`Action`]. All default to `false`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionFlags {
    #[serde(default)]
    pub can_read: bool,
    #[serde(default)]
    pub can_create: bool,
    #[serde(default)]
    pub can_replace: bool,
    #[serde(default)]
    pub can_modify: bool,
    #[serde(default)]
    pub can_delete: bool,
}

impl ActionFlags {
    pub const NONE: ActionFlags = ActionFlags {
        can_read: false,
        can_create: false,
        can_replace: false,
        can_modify: false,
        can_delete: false,
    };

    pub const ALL: ActionFlags = ActionFlags {
        can_read: true,
        can_create: true,
        can_replace: true,
        can_modify: true,
        can_delete: true,
    };

    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::Read => self.can_read,
            Action::Create => self.can_create,
            Action::Replace => self.can_replace,
            Action::Modify => self.can_modify,
            Action::Delete => self.can_delete,
        }
    }

    #[must_use]
    pub fn with(mut self, action: Action, allowed: bool) -> Self {
        match action {
            Action::Read => self.can_read = allowed,
            Action::Create => self.can_create = allowed,
            Action::Replace => self.can_replace = allowed,
            Action::Modify => self.can_modify = allowed,
            Action::Delete => self.can_delete = allowed,
        }
        self
    }

    /// Flags with exactly the given actions set.
    pub fn only(actions: &[Action]) -> Self {
        actions
            .iter()
            .fold(ActionFlags::NONE, |flags, a| flags.with(*a, true))
    }

    pub fn granted(&self) -> Vec<Action> {
        Action::ALL.into_iter().filter(|a| self.allows(*a)).collect()
    }
}
