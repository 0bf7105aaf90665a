use std::sync::Arc;

use warden_api::{
    app::{AppServices, build_app},
    config::AppConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    warden_observability::init();

    let config = AppConfig::from_env()?;
    tracing::debug!(?config, "configuration loaded");

    let services = Arc::new(AppServices::from_config(&config).await?);
    let app = build_app(services);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
