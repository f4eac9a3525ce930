//! Infrastructure layer: in-memory stores, configuration and startup seeding.

pub mod bootstrap;
pub mod config;
pub mod directory;
pub mod registry;

pub use bootstrap::{BootstrapOutcome, default_routes, ensure_administrator};
pub use config::{AppConfig, ConfigError, load_config, load_config_from_str};
pub use directory::{Directory, DirectoryError, DirectoryResult};
pub use registry::InMemoryRouteRegistry;
