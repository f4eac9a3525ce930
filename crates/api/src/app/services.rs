//! Service wiring: registry, directory and gate built from configuration.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use stockroom_auth::{AuthorizationGate, GateConfig, Hs256JwtValidator};
use stockroom_infra::{AppConfig, ConfigError, Directory, DirectoryError, InMemoryRouteRegistry, ensure_administrator};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("bootstrap failed: {0}")]
    Bootstrap(#[from] DirectoryError),
}

pub struct AppServices {
    pub gate: AuthorizationGate,
    pub directory: Arc<Directory>,
    pub routes: Arc<InMemoryRouteRegistry>,
}

impl AppServices {
    pub fn gate_config(&self) -> &GateConfig {
        self.gate.config()
    }

    pub fn default_domain(&self) -> &str {
        &self.gate.config().default_domain
    }
}

/// Build every service from `config`, seeding the registry and, when
/// configured, the administrator account.
pub fn build_services(config: &AppConfig) -> Result<AppServices, StartupError> {
    let routes = Arc::new(InMemoryRouteRegistry::with_routes(config.route_definitions()?));
    let directory = Arc::new(Directory::new(routes.clone()));

    if let Some(bootstrap) = &config.bootstrap {
        ensure_administrator(&directory, routes.as_ref(), bootstrap, Utc::now())?;
    }

    let gate = AuthorizationGate::new(
        Arc::new(Hs256JwtValidator::new(config.auth.jwt_secret.as_bytes())),
        routes.clone(),
        directory.clone(),
        config.auth.gate_config(),
    );

    tracing::info!(
        routes = routes.len(),
        domain = %gate.config().default_domain,
        "services initialized"
    );

    Ok(AppServices {
        gate,
        directory,
        routes,
    })
}
