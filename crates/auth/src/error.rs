use thiserror::Error;

/// Failure of a collaborator lookup (route registry or subject directory).
///
/// Never retried; the gate converts it into a denial.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("lookup backend unavailable: {0}")]
    Unavailable(String),

    #[error("stored data is corrupt: {0}")]
    Corrupt(String),
}

impl LookupError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }
}

/// Failure while evaluating a subject's effective permissions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MergeError {
    #[error("malformed permission record from {source_label}: {detail}")]
    MalformedRecord { source_label: String, detail: String },

    #[error("subject lookup failed: {0}")]
    Lookup(#[from] LookupError),
}
