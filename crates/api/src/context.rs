use stockroom_auth::{Action, Grant, Identity};
use stockroom_core::UserId;

/// Authenticated subject of a request, inserted by the middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectContext {
    identity: Identity,
    action: Option<Action>,
}

impl SubjectContext {
    /// Authenticated without a route decision (session endpoints).
    pub fn authenticated(identity: Identity) -> Self {
        Self { identity, action: None }
    }

    pub fn granted(grant: Grant) -> Self {
        Self {
            identity: grant.identity,
            action: Some(grant.action),
        }
    }

    pub fn subject(&self) -> UserId {
        self.identity.subject
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The action the gate granted, if the request went through it.
    pub fn action(&self) -> Option<Action> {
        self.action
    }
}
