use anyhow::Context;

use cyberbank_api::{app::build_app, config::AppConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cyberbank_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let app = build_app(&config).context("failed to build router")?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
