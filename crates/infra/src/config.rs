//! Layered configuration.
//!
//! Precedence, highest first:
//! 1. Environment variables (`STOCKROOM__AUTH__JWT_SECRET`, `STOCKROOM__LOG__JSON`, ...)
//! 2. TOML file (explicit path, else `stockroom.toml` in the working directory)
//! 3. Built-in defaults

use std::collections::HashSet;
use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use thiserror::Error;

use stockroom_auth::{Action, ActionFlags, DEFAULT_DOMAIN, GateConfig, RouteDefinition};

/// File picked up when no explicit path is given.
pub const DEFAULT_CONFIG_PATH: &str = "stockroom.toml";

/// Environment variable naming an explicit configuration file.
pub const CONFIG_PATH_ENV: &str = "STOCKROOM_CONFIG";

const ENV_PREFIX: &str = "STOCKROOM";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(String),

    #[error("invalid configuration: {message}")]
    Invalid { message: String },

    #[error("missing required configuration: {field}")]
    Missing { field: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub log: LogConfig,
    /// Route table seed; the built-in table is used when empty.
    pub routes: Vec<RouteSeed>,
    pub bootstrap: Option<BootstrapConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 shared secret. Required outside tests.
    pub jwt_secret: String,
    pub default_domain: String,
    /// Empty string disables prefix stripping.
    pub api_prefix: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            default_domain: DEFAULT_DOMAIN.to_string(),
            api_prefix: "api".to_string(),
        }
    }
}

impl AuthConfig {
    pub fn gate_config(&self) -> GateConfig {
        let prefix = self.api_prefix.trim().trim_matches('/');
        GateConfig {
            default_domain: self.default_domain.trim().to_string(),
            api_prefix: (!prefix.is_empty()).then(|| prefix.to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive; `RUST_LOG` wins when set.
    pub filter: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: true,
        }
    }
}

/// One route of the registry seed.
///
/// `methods` lists the HTTP verbs (or action names such as `canRead`) the
/// route serves; omitted means every verb.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteSeed {
    pub route: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub methods: Option<Vec<String>>,
}

fn default_true() -> bool {
    true
}

impl RouteSeed {
    pub fn to_definition(&self, default_domain: &str) -> Result<RouteDefinition, ConfigError> {
        if self.route.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "routes[].route cannot be empty".to_string(),
            });
        }

        let actions = match &self.methods {
            None => ActionFlags::ALL,
            Some(methods) => {
                let parsed = methods
                    .iter()
                    .map(|m| {
                        Action::parse(m).ok_or_else(|| ConfigError::Invalid {
                            message: format!("route '{}': unknown method '{m}'", self.route),
                        })
                    })
                    .collect::<Result<Vec<Action>, ConfigError>>()?;
                ActionFlags::only(&parsed)
            }
        };

        let domain = self.domain.as_deref().unwrap_or(default_domain);
        Ok(RouteDefinition::new(&self.route, domain)
            .with_actions(actions)
            .with_active(self.active))
    }
}

/// Administrator account created at startup when absent.
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default = "default_admin_group")]
    pub admin_group: String,
    pub admin_login: String,
    #[serde(default = "default_admin_name")]
    pub admin_name: String,
    pub admin_email: String,
}

fn default_admin_group() -> String {
    "Administradores".to_string()
}

fn default_admin_name() -> String {
    "Administrator".to_string()
}

impl AppConfig {
    /// Registry content: configured seeds, or the built-in table.
    pub fn route_definitions(&self) -> Result<Vec<RouteDefinition>, ConfigError> {
        let domain = self.auth.default_domain.trim();
        if self.routes.is_empty() {
            return Ok(crate::bootstrap::default_routes(domain));
        }
        let mut seen = HashSet::new();
        self.routes
            .iter()
            .map(|seed| {
                let definition = seed.to_definition(domain)?;
                if !seen.insert(definition.key()) {
                    return Err(ConfigError::Invalid {
                        message: format!(
                            "route '{}' is declared twice for domain '{}'",
                            definition.route, definition.domain
                        ),
                    });
                }
                Ok(definition)
            })
            .collect()
    }
}

/// Load configuration from a TOML string (tests, embedded defaults).
pub fn load_config_from_str(toml_str: &str) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from_str(toml_str, FileFormat::Toml))
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_shape(&app_config)?;
    Ok(app_config)
}

/// Load configuration from file and environment.
///
/// An explicit `config_path` must exist; the default path is optional.
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    match config_path {
        Some(path) => {
            if !Path::new(path).exists() {
                return Err(ConfigError::Load(format!("configuration file not found: {path}")));
            }
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }
        None => {
            builder = builder.add_source(File::new(DEFAULT_CONFIG_PATH, FileFormat::Toml).required(false));
        }
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    );

    let app_config: AppConfig = builder
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate(&app_config)?;
    Ok(app_config)
}

/// Structural checks that hold for every deployment.
fn validate_shape(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.bind_addr.trim().is_empty() {
        return Err(ConfigError::Missing {
            field: "server.bind_addr".to_string(),
        });
    }
    if config.auth.default_domain.trim().is_empty() {
        return Err(ConfigError::Missing {
            field: "auth.default_domain".to_string(),
        });
    }
    if let Some(bootstrap) = &config.bootstrap {
        if bootstrap.admin_login.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "bootstrap.admin_login".to_string(),
            });
        }
        if !bootstrap.admin_email.contains('@') {
            return Err(ConfigError::Invalid {
                message: format!("bootstrap.admin_email is not an email: {}", bootstrap.admin_email),
            });
        }
    }
    config.route_definitions()?;
    Ok(())
}

fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    validate_shape(config)?;
    if config.auth.jwt_secret.is_empty() {
        return Err(ConfigError::Missing {
            field: "auth.jwt_secret (set STOCKROOM__AUTH__JWT_SECRET)".to_string(),
        });
    }
    Ok(())
}
