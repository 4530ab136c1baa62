use std::sync::Arc;

use anyhow::Context;

use pharmatrack_api::app::{build_app, services::AppServices};
use pharmatrack_infra::{open_store, AppConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;
    pharmatrack_observability::init(config.log_format);

    let store = open_store(&config).await.context("failed to open store")?;
    let services = Arc::new(AppServices::new(store, &config));
    let app = build_app(services);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
