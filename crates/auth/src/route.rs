//! System-wide route capabilities.
//!
//! A [`RouteDefinition`] says whether the system serves a verb on a route at
//! all, independently of who is asking. The gate consults it before any
//! subject permission is looked at.

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

use crate::action::{Action, ActionFlags};
use crate::error::LookupError;
use crate::permissions::{DEFAULT_DOMAIN, PermissionKey, normalize_route};

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

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDefinition {
    #[serde(deserialize_with = "deserialize_route")]
    pub route: String,
    #[serde(default = "default_domain")]
    pub domain: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(flatten)]
    pub actions: ActionFlags,
}

impl RouteDefinition {
    /// Active route supporting every verb.
    pub fn new(route: &str, domain: &str) -> Self {
        Self {
            route: normalize_route(route),
            domain: domain.to_string(),
            active: true,
            actions: ActionFlags::ALL,
        }
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

    pub fn supports(&self, action: Action) -> bool {
        self.actions.allows(action)
    }
}

/// Read side of the route capability table.
pub trait RouteRegistry: Send + Sync {
    /// Exact lookup; `route` is normalized by the implementation.
    ///
    /// `Ok(None)` means the pair is unknown, which is a different outcome from
    /// a definition with `active == false`.
    fn find_route(&self, route: &str, domain: &str) -> Result<Option<RouteDefinition>, LookupError>;

    /// Every definition, ordered by route then domain.
    fn list_routes(&self) -> Result<Vec<RouteDefinition>, LookupError>;
}

impl<R> RouteRegistry for Arc<R>
where
    R: RouteRegistry + ?Sized,
{
    fn find_route(&self, route: &str, domain: &str) -> Result<Option<RouteDefinition>, LookupError> {
        (**self).find_route(route, domain)
    }

    fn list_routes(&self) -> Result<Vec<RouteDefinition>, LookupError> {
        (**self).list_routes()
    }
}

/// Derive the canonical route name from a request path.
///
/// The query string is dropped and empty segments ignored. When the first
/// segment equals `api_prefix` and another segment follows, that second
/// segment is the route; otherwise the first one is. `/api/Produtos/12?x=1`
/// and `/produtos` both yield `produtos`.
pub fn route_from_path(path: &str, api_prefix: Option<&str>) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let mut segments = path.split('/').filter(|s| !s.is_empty());

    let first = match segments.next() {
        Some(s) => s,
        None => return String::new(),
    };

    let is_prefix = api_prefix.is_some_and(|p| first.eq_ignore_ascii_case(p.trim_matches('/')));
    let chosen = match (is_prefix, segments.next()) {
        (true, Some(second)) => second,
        _ => first,
    };

    normalize_route(chosen)
}
