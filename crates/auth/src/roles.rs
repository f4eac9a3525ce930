use serde::{Deserialize, Serialize};

use stockroom_core::DomainError;

/// Descriptive profile of a user account.
///
/// Profiles are labels only: authorization is decided by permission records,
/// never by the profile.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Administrator,
    Manager,
    #[default]
    Stockkeeper,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Administrator => "administrator",
            UserRole::Manager => "manager",
            UserRole::Stockkeeper => "stockkeeper",
        }
    }
}

impl core::fmt::Display for UserRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for UserRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "administrator" => Ok(UserRole::Administrator),
            "manager" => Ok(UserRole::Manager),
            "stockkeeper" => Ok(UserRole::Stockkeeper),
            other => Err(DomainError::validation(format!("unknown role '{other}'"))),
        }
    }
}
