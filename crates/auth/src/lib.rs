//! `stockroom-auth` - authentication and authorization core.
//!
//! Decoupled from HTTP and storage: collaborators (identity verification,
//! the route table, the subject directory) are traits, and every decision is
//! a pure function of their answers.

pub mod action;
pub mod claims;
pub mod error;
pub mod explain;
pub mod gate;
pub mod group;
pub mod identity;
pub mod merge;
pub mod permissions;
pub mod roles;
pub mod route;
pub mod subject;
pub mod user;

pub use action::{Action, ActionFlags};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use error::{LookupError, MergeError};
pub use explain::{MergeExplanation, explain};
pub use gate::{
    AccessRequest, AuthorizationGate, Decision, Denial, DenialKind, DenialReason, GateConfig, Grant,
};
pub use group::{Group, GroupCommand, GroupEvent};
pub use identity::{Hs256JwtValidator, Identity, IdentityError, IdentityResolver, extract_bearer};
pub use merge::{
    EffectivePermission, PermissionBreakdown, PermissionSource, breakdown, effective_for,
    effective_permissions, has_permission, subject_has_permission, try_has_permission,
    try_subject_has_permission,
};
pub use permissions::{DEFAULT_DOMAIN, PermissionKey, PermissionRecord, normalize_route};
pub use roles::UserRole;
pub use route::{RouteDefinition, RouteRegistry, route_from_path};
pub use subject::{GroupGrant, SubjectDirectory, SubjectPermissions};
pub use user::{User, UserCommand, UserEvent};
