use anyhow::Context;

use remitflow_infra::PipelineConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = PipelineConfig::from_env()?;
    remitflow_observability::init_with(config.log_format);
    for fallback in &config.fallbacks {
        tracing::warn!(
            key = fallback.key,
            value = %fallback.value,
            default = %fallback.default,
            "invalid configuration value; using default"
        );
    }

    let app = remitflow_api::app::build_app(&config).context("failed to start directory writer")?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
