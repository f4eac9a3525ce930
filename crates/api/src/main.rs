use std::sync::Arc;

use anyhow::Context;

use stockroom_infra::config::{CONFIG_PATH_ENV, load_config};
use stockroom_observability::LogFormat;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e).context("failed to read .env");
        }
    }

    let config_path = std::env::var(CONFIG_PATH_ENV).ok();
    let config = load_config(config_path.as_deref()).context("failed to load configuration")?;

    stockroom_observability::init(&config.log.filter, LogFormat::from_json_flag(config.log.json));

    let services = stockroom_api::app::services::build_services(&config).context("failed to build services")?;
    let app = stockroom_api::app::build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
