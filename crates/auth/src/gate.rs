//! Authorization gate.
//!
//! One call per protected request. The checks run in a fixed order and the
//! first failing check decides the outcome:
//!
//! 1. credential present and valid (401)
//! 2. route known to the registry (404)
//! 3. verb maps to an action (405)
//! 4. route active and the action enabled on it system-wide (403)
//! 5. the subject's merged permissions grant the action (403)
//!
//! Every failure, including collaborator failures, is a [`Denial`]; nothing
//! escapes as an error.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::error::MergeError;
use crate::identity::{Identity, IdentityError, IdentityResolver, extract_bearer};
use crate::merge::try_subject_has_permission;
use crate::permissions::DEFAULT_DOMAIN;
use crate::route::{RouteRegistry, route_from_path};
use crate::subject::SubjectDirectory;

/// Deployment-level settings of the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Domain every request is evaluated against.
    pub default_domain: String,
    /// Leading path segment skipped when deriving the route name.
    pub api_prefix: Option<String>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            default_domain: DEFAULT_DOMAIN.to_string(),
            api_prefix: Some("api".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AccessRequest<'a> {
    /// Raw `Authorization` header value.
    pub authorization: Option<&'a str>,
    pub path: &'a str,
    pub method: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grant {
    pub identity: Identity,
    pub route: String,
    pub domain: String,
    pub action: Action,
}

/// Client-visible outcome class of a denial.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DenialKind {
    AuthenticationError,
    ResourceNotFound,
    MethodNotAllowed,
    Forbidden,
    #[serde(rename = "serverError")]
    Internal,
}

impl DenialKind {
    pub fn status_code(self) -> u16 {
        match self {
            DenialKind::AuthenticationError => 401,
            DenialKind::Forbidden => 403,
            DenialKind::ResourceNotFound => 404,
            DenialKind::MethodNotAllowed => 405,
            DenialKind::Internal => 500,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DenialKind::AuthenticationError => "authenticationError",
            DenialKind::ResourceNotFound => "resourceNotFound",
            DenialKind::MethodNotAllowed => "methodNotAllowed",
            DenialKind::Forbidden => "forbidden",
            DenialKind::Internal => "serverError",
        }
    }
}

impl core::fmt::Display for DenialKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Internal reason behind a denial, finer than [`DenialKind`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    MissingCredential,
    InvalidCredential,
    UnknownRoute,
    UnsupportedMethod,
    RouteInactive,
    ActionDisabled,
    PermissionDenied,
    /// Route registry unavailable.
    LookupFailed,
    /// Subject directory unavailable; the subject is treated as having no
    /// permissions.
    SubjectLookupFailed,
}

impl DenialReason {
    pub fn kind(self) -> DenialKind {
        match self {
            DenialReason::MissingCredential | DenialReason::InvalidCredential => {
                DenialKind::AuthenticationError
            }
            DenialReason::UnknownRoute => DenialKind::ResourceNotFound,
            DenialReason::UnsupportedMethod => DenialKind::MethodNotAllowed,
            DenialReason::RouteInactive
            | DenialReason::ActionDisabled
            | DenialReason::PermissionDenied
            | DenialReason::SubjectLookupFailed => DenialKind::Forbidden,
            DenialReason::LookupFailed => DenialKind::Internal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Denial {
    pub kind: DenialKind,
    pub reason: DenialReason,
    pub message: String,
}

impl Denial {
    fn new(reason: DenialReason, message: impl Into<String>) -> Self {
        Self {
            kind: reason.kind(),
            reason,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allowed(Grant),
    Denied(Denial),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed(_))
    }

    pub fn denial(&self) -> Option<&Denial> {
        match self {
            Decision::Denied(d) => Some(d),
            Decision::Allowed(_) => None,
        }
    }
}

pub struct AuthorizationGate {
    identity: Arc<dyn IdentityResolver>,
    routes: Arc<dyn RouteRegistry>,
    subjects: Arc<dyn SubjectDirectory>,
    config: GateConfig,
}

impl AuthorizationGate {
    pub fn new(
        identity: Arc<dyn IdentityResolver>,
        routes: Arc<dyn RouteRegistry>,
        subjects: Arc<dyn SubjectDirectory>,
        config: GateConfig,
    ) -> Self {
        Self {
            identity,
            routes,
            subjects,
            config,
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Credential check alone, for endpoints that need a subject but no route
    /// permission.
    pub fn authenticate(&self, authorization: Option<&str>, now: DateTime<Utc>) -> Result<Identity, Denial> {
        let token = extract_bearer(authorization).map_err(authentication_denial)?;
        self.identity.resolve(token, now).map_err(authentication_denial)
    }

    pub fn authorize(&self, request: &AccessRequest<'_>, now: DateTime<Utc>) -> Decision {
        let decision = self.decide(request, now);
        match &decision {
            Decision::Allowed(grant) => tracing::info!(
                subject = %grant.identity.subject,
                route = %grant.route,
                action = %grant.action,
                "access granted"
            ),
            Decision::Denied(denial) => tracing::warn!(
                method = request.method,
                path = request.path,
                kind = %denial.kind,
                reason = ?denial.reason,
                message = %denial.message,
                "access denied"
            ),
        }
        decision
    }

    fn decide(&self, request: &AccessRequest<'_>, now: DateTime<Utc>) -> Decision {
        let identity = match self.authenticate(request.authorization, now) {
            Ok(identity) => identity,
            Err(denial) => return Decision::Denied(denial),
        };

        let domain = self.config.default_domain.as_str();
        let route = route_from_path(request.path, self.config.api_prefix.as_deref());

        let definition = match self.routes.find_route(&route, domain) {
            Ok(Some(definition)) => definition,
            Ok(None) => {
                return deny(
                    DenialReason::UnknownRoute,
                    format!("route '{route}' is not registered for domain '{domain}'"),
                );
            }
            Err(e) => {
                tracing::error!(error = %e, route = %route, domain, "route registry lookup failed");
                return deny(DenialReason::LookupFailed, "internal error while authorizing request");
            }
        };

        let Some(action) = Action::for_method(request.method) else {
            return deny(
                DenialReason::UnsupportedMethod,
                format!("method {} is not allowed", request.method),
            );
        };

        if !definition.active {
            return deny(
                DenialReason::RouteInactive,
                format!("route '{route}' is inactive"),
            );
        }
        if !definition.supports(action) {
            return deny(
                DenialReason::ActionDisabled,
                format!("{} is not enabled on route '{route}'", action.method()),
            );
        }

        match try_subject_has_permission(self.subjects.as_ref(), &identity.subject, &route, domain, action) {
            Ok(true) => Decision::Allowed(Grant {
                identity,
                route,
                domain: domain.to_string(),
                action,
            }),
            Ok(false) => deny(
                DenialReason::PermissionDenied,
                forbidden_message(&identity, action, &route),
            ),
            Err(e) => {
                let reason = match e {
                    MergeError::Lookup(_) => DenialReason::SubjectLookupFailed,
                    MergeError::MalformedRecord { .. } => DenialReason::PermissionDenied,
                };
                tracing::error!(error = %e, subject = %identity.subject, route = %route, "permission evaluation failed");
                deny(reason, forbidden_message(&identity, action, &route))
            }
        }
    }
}

fn deny(reason: DenialReason, message: impl Into<String>) -> Decision {
    Decision::Denied(Denial::new(reason, message))
}

fn forbidden_message(identity: &Identity, action: Action, route: &str) -> String {
    format!(
        "user {} does not have permission to {} on route '{route}'",
        identity.audit_name(),
        action.method()
    )
}

fn authentication_denial(e: IdentityError) -> Denial {
    let reason = match e {
        IdentityError::MissingCredential => DenialReason::MissingCredential,
        _ => DenialReason::InvalidCredential,
    };
    Denial::new(reason, e.to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use stockroom_core::UserId;

    use super::*;
    use crate::action::ActionFlags;
    use crate::error::LookupError;
    use crate::permissions::PermissionRecord;
    use crate::route::RouteDefinition;
    use crate::subject::{GroupGrant, SubjectPermissions};

    struct StaticIdentity;

    impl IdentityResolver for StaticIdentity {
        fn resolve(&self, token: &str, _now: DateTime<Utc>) -> Result<Identity, IdentityError> {
            let subject: UserId = token
                .parse()
                .map_err(|_| IdentityError::InvalidToken("not a subject id".to_string()))?;
            Ok(Identity {
                subject,
                login: Some("EST0001".to_string()),
                role: None,
            })
        }
    }

    #[derive(Default)]
    struct Routes {
        routes: Vec<RouteDefinition>,
        broken: bool,
    }

    impl RouteRegistry for Routes {
        fn find_route(&self, route: &str, domain: &str) -> Result<Option<RouteDefinition>, LookupError> {
            if self.broken {
                return Err(LookupError::unavailable("registry down"));
            }
            Ok(self
                .routes
                .iter()
                .find(|r| r.route == route && r.domain == domain)
                .cloned())
        }

        fn list_routes(&self) -> Result<Vec<RouteDefinition>, LookupError> {
            Ok(self.routes.clone())
        }
    }

    #[derive(Default)]
    struct Subjects {
        subjects: HashMap<UserId, SubjectPermissions>,
        broken: bool,
    }

    impl SubjectDirectory for Subjects {
        fn load_subject(&self, subject: &UserId) -> Result<Option<SubjectPermissions>, LookupError> {
            if self.broken {
                return Err(LookupError::unavailable("directory down"));
            }
            Ok(self.subjects.get(subject).cloned())
        }
    }

    fn produtos() -> PermissionRecord {
        PermissionRecord::new("produtos", "localhost")
    }

    fn gate_with(routes: Routes, subjects: Subjects) -> AuthorizationGate {
        AuthorizationGate::new(
            Arc::new(StaticIdentity),
            Arc::new(routes),
            Arc::new(subjects),
            GateConfig::default(),
        )
    }

    fn single_subject(permissions: SubjectPermissions) -> (UserId, Subjects) {
        let id = UserId::new();
        let mut subjects = Subjects::default();
        subjects.subjects.insert(id, permissions);
        (id, subjects)
    }

    fn routes(defs: Vec<RouteDefinition>) -> Routes {
        Routes {
            routes: defs,
            broken: false,
        }
    }

    fn request(gate: &AuthorizationGate, subject: &UserId, method: &str, path: &str) -> Decision {
        let header = format!("Bearer {subject}");
        gate.authorize(
            &AccessRequest {
                authorization: Some(&header),
                path,
                method,
            },
            Utc::now(),
        )
    }

    fn admin_group(record: PermissionRecord) -> SubjectPermissions {
        SubjectPermissions::new(vec![], vec![GroupGrant::new("Administradores", vec![record])])
    }

    #[test]
    fn active_group_grant_allows() {
        let (id, subjects) = single_subject(admin_group(produtos().with_actions(ActionFlags::ALL)));
        let gate = gate_with(routes(vec![RouteDefinition::new("produtos", "localhost")]), subjects);

        let Decision::Allowed(grant) = request(&gate, &id, "GET", "/api/produtos") else {
            panic!("expected allow");
        };
        assert_eq!(grant.route, "produtos");
        assert_eq!(grant.domain, "localhost");
        assert_eq!(grant.action, Action::Read);
        assert_eq!(grant.identity.subject, id);
    }

    #[test]
    fn inactive_group_record_is_forbidden() {
        let (id, subjects) = single_subject(admin_group(
            produtos().with_actions(ActionFlags::ALL).with_active(false),
        ));
        let gate = gate_with(routes(vec![RouteDefinition::new("produtos", "localhost")]), subjects);

        let decision = request(&gate, &id, "GET", "/api/produtos");
        let denial = decision.denial().unwrap();
        assert_eq!(denial.kind, DenialKind::Forbidden);
        assert_eq!(denial.reason, DenialReason::PermissionDenied);
        assert_eq!(denial.status_code(), 403);
    }

    #[test]
    fn individual_record_overrides_group() {
        let subject = SubjectPermissions::new(
            vec![produtos().deny(Action::Read)],
            vec![GroupGrant::new("Administradores", vec![produtos().grant(Action::Read)])],
        );
        let (id, subjects) = single_subject(subject);
        let gate = gate_with(routes(vec![RouteDefinition::new("produtos", "localhost")]), subjects);

        let decision = request(&gate, &id, "GET", "/api/produtos");
        assert_eq!(decision.denial().unwrap().kind, DenialKind::Forbidden);
    }

    #[test]
    fn unknown_route_is_not_found() {
        let (id, subjects) = single_subject(admin_group(produtos().with_actions(ActionFlags::ALL)));
        let gate = gate_with(routes(vec![RouteDefinition::new("produtos", "localhost")]), subjects);

        let decision = request(&gate, &id, "GET", "/api/naorota");
        let denial = decision.denial().unwrap();
        assert_eq!(denial.kind, DenialKind::ResourceNotFound);
        assert_eq!(denial.status_code(), 404);
    }

    #[test]
    fn route_capability_gates_before_subject_permission() {
        let (id, subjects) = single_subject(admin_group(produtos().with_actions(ActionFlags::ALL)));
        let route = RouteDefinition::new("produtos", "localhost")
            .with_actions(ActionFlags::ALL.with(Action::Create, false));
        let gate = gate_with(routes(vec![route]), subjects);

        let decision = request(&gate, &id, "POST", "/api/produtos");
        let denial = decision.denial().unwrap();
        assert_eq!(denial.kind, DenialKind::Forbidden);
        assert_eq!(denial.reason, DenialReason::ActionDisabled);
    }

    #[test]
    fn first_group_in_iteration_order_decides() {
        let subject = SubjectPermissions::new(
            vec![],
            vec![
                GroupGrant::new("G1", vec![PermissionRecord::new("x", "localhost").grant(Action::Modify)]),
                GroupGrant::new("G2", vec![PermissionRecord::new("x", "localhost").deny(Action::Modify)]),
            ],
        );
        let (id, subjects) = single_subject(subject);
        let gate = gate_with(routes(vec![RouteDefinition::new("x", "localhost")]), subjects);

        assert!(request(&gate, &id, "PATCH", "/api/x/42").is_allowed());
    }

    #[test]
    fn missing_and_invalid_credentials_are_unauthenticated() {
        let gate = gate_with(routes(vec![RouteDefinition::new("produtos", "localhost")]), Subjects::default());

        let missing = gate.authorize(
            &AccessRequest {
                authorization: None,
                path: "/api/produtos",
                method: "GET",
            },
            Utc::now(),
        );
        assert_eq!(missing.denial().unwrap().reason, DenialReason::MissingCredential);
        assert_eq!(missing.denial().unwrap().status_code(), 401);

        let invalid = gate.authorize(
            &AccessRequest {
                authorization: Some("Bearer nope"),
                path: "/api/produtos",
                method: "GET",
            },
            Utc::now(),
        );
        assert_eq!(invalid.denial().unwrap().reason, DenialReason::InvalidCredential);
        assert_eq!(invalid.denial().unwrap().kind, DenialKind::AuthenticationError);
    }

    #[test]
    fn unknown_verb_is_method_not_allowed_after_route_lookup() {
        let (id, subjects) = single_subject(SubjectPermissions::default());
        let gate = gate_with(routes(vec![RouteDefinition::new("produtos", "localhost")]), subjects);

        let known = request(&gate, &id, "OPTIONS", "/api/produtos");
        assert_eq!(known.denial().unwrap().status_code(), 405);

        let unknown = request(&gate, &id, "OPTIONS", "/api/naorota");
        assert_eq!(unknown.denial().unwrap().status_code(), 404);
    }

    #[test]
    fn inactive_route_denies_everybody() {
        let (id, subjects) = single_subject(admin_group(produtos().with_actions(ActionFlags::ALL)));
        let gate = gate_with(
            routes(vec![RouteDefinition::new("produtos", "localhost").with_active(false)]),
            subjects,
        );

        let decision = request(&gate, &id, "GET", "/api/produtos");
        assert_eq!(decision.denial().unwrap().reason, DenialReason::RouteInactive);
    }

    #[test]
    fn unknown_subject_is_forbidden() {
        let gate = gate_with(routes(vec![RouteDefinition::new("produtos", "localhost")]), Subjects::default());
        let decision = request(&gate, &UserId::new(), "GET", "/api/produtos");
        let denial = decision.denial().unwrap();
        assert_eq!(denial.kind, DenialKind::Forbidden);
        assert!(denial.message.contains("EST0001"));
        assert!(denial.message.contains("produtos"));
    }

    #[test]
    fn collaborator_failures_fail_closed() {
        let registry_down = gate_with(
            Routes {
                routes: vec![],
                broken: true,
            },
            Subjects::default(),
        );
        let decision = request(&registry_down, &UserId::new(), "GET", "/api/produtos");
        assert_eq!(decision.denial().unwrap().kind, DenialKind::Internal);
        assert_eq!(decision.denial().unwrap().status_code(), 500);

        let directory_down = gate_with(
            routes(vec![RouteDefinition::new("produtos", "localhost")]),
            Subjects {
                subjects: HashMap::new(),
                broken: true,
            },
        );
        let decision = request(&directory_down, &UserId::new(), "GET", "/api/produtos");
        let denial = decision.denial().unwrap();
        assert_eq!(denial.kind, DenialKind::Forbidden);
        assert_eq!(denial.reason, DenialReason::SubjectLookupFailed);
        assert_eq!(denial.kind, denial.reason.kind());
    }

    #[test]
    fn repeated_calls_are_deterministic() {
        let (id, subjects) = single_subject(admin_group(produtos().grant(Action::Read)));
        let gate = gate_with(routes(vec![RouteDefinition::new("produtos", "localhost")]), subjects);

        let first = request(&gate, &id, "DELETE", "/api/produtos/1");
        for _ in 0..10 {
            assert_eq!(request(&gate, &id, "DELETE", "/api/produtos/1"), first);
        }
    }

    #[test]
    fn denial_kinds_serialize_as_wire_names() {
        assert_eq!(serde_json::to_string(&DenialKind::Internal).unwrap(), "\"serverError\"");
        assert_eq!(
            serde_json::to_string(&DenialKind::MethodNotAllowed).unwrap(),
            "\"methodNotAllowed\""
        );
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn path_strategy() -> impl Strategy<Value = String> {
            prop_oneof![
                Just("/api/produtos".to_string()),
                Just("/api/produtos/42?x=1#y".to_string()),
                Just("?#".to_string()),
                Just("".to_string()),
                Just("/api".to_string()),
                Just("/api//Produtos//".to_string()),
                Just("/api/prodütos/ção".to_string()),
                ".*",
            ]
        }

        fn method_strategy() -> impl Strategy<Value = String> {
            prop_oneof![
                prop::sample::select(vec!["GET", "get", "Post", "PUT", "patch", "DELETE", "OPTIONS", "TRACE", "", " GET "])
                    .prop_map(str::to_string),
                "[a-zA-Z]{0,8}",
                ".*",
            ]
        }

        proptest! {
            #[test]
            fn every_request_gets_exactly_one_decision(
                header_kind in 0u8..6,
                noise in ".*",
                path in path_strategy(),
                method in method_strategy(),
                routes_down in any::<bool>(),
                subjects_down in any::<bool>(),
            ) {
                let id = UserId::new();
                let mut subjects = Subjects {
                    subjects: HashMap::new(),
                    broken: subjects_down,
                };
                subjects.subjects.insert(id, admin_group(produtos().with_actions(ActionFlags::ALL)));
                let registry = Routes {
                    routes: vec![
                        RouteDefinition::new("produtos", "localhost"),
                        RouteDefinition::new("logs", "localhost").with_actions(ActionFlags::only(&[Action::Read])),
                    ],
                    broken: routes_down,
                };
                let gate = gate_with(registry, subjects);

                let header = match header_kind {
                    0 => None,
                    1 => Some("Bearer ".to_string()),
                    2 => Some(format!("Bearer {id}")),
                    3 => Some(format!("bearer {id}")),
                    4 => Some(format!("Bearer {noise}")),
                    _ => Some(noise.clone()),
                };
                let access = AccessRequest {
                    authorization: header.as_deref(),
                    path: &path,
                    method: &method,
                };

                let decision = gate.authorize(&access, Utc::now());
                match &decision {
                    Decision::Allowed(grant) => {
                        prop_assert_eq!(grant.identity.subject, id);
                        prop_assert!(Action::for_method(&method).is_some());
                    }
                    Decision::Denied(denial) => {
                        prop_assert!([401, 403, 404, 405, 500].contains(&denial.status_code()));
                        prop_assert_eq!(denial.kind, denial.reason.kind());
                    }
                }
                prop_assert_eq!(gate.authorize(&access, Utc::now()), decision);
            }
        }
    }
}
