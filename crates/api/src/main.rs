use anyhow::Context;

use keel_api::{ApiConfig, app};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    keel_observability::init();

    let config = ApiConfig::from_env()?;
    tracing::debug!(?config, "loaded configuration");

    let app = app::build_app(&config).await?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
