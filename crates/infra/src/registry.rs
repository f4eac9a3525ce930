//! In-memory route registry.

use std::collections::BTreeMap;
use std::sync::RwLock;

use stockroom_auth::{LookupError, PermissionKey, RouteDefinition, RouteRegistry};

/// Route table keyed by (route, domain), seeded from configuration.
///
/// A poisoned lock is reported as a lookup failure.
#[derive(Debug, Default)]
pub struct InMemoryRouteRegistry {
    inner: RwLock<BTreeMap<PermissionKey, RouteDefinition>>,
}

impl InMemoryRouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A later definition for the same (route, domain) replaces an earlier one.
    pub fn with_routes(routes: impl IntoIterator<Item = RouteDefinition>) -> Self {
        let map = routes
            .into_iter()
            .map(|def| (def.key(), def))
            .collect();
        Self {
            inner: RwLock::new(map),
        }
    }

    /// Insert or replace the definition for its (route, domain).
    pub fn upsert(&self, definition: RouteDefinition) -> Result<(), LookupError> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| LookupError::unavailable("route registry lock poisoned"))?;
        map.insert(definition.key(), definition);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RouteRegistry for InMemoryRouteRegistry {
    fn find_route(&self, route: &str, domain: &str) -> Result<Option<RouteDefinition>, LookupError> {
        let map = self
            .inner
            .read()
            .map_err(|_| LookupError::unavailable("route registry lock poisoned"))?;
        Ok(map.get(&PermissionKey::new(route, domain)).cloned())
    }

    fn list_routes(&self) -> Result<Vec<RouteDefinition>, LookupError> {
        let map = self
            .inner
            .read()
            .map_err(|_| LookupError::unavailable("route registry lock poisoned"))?;
        Ok(map.values().cloned().collect())
    }
}
