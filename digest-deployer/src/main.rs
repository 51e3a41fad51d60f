use digest_deployer::config::DeployerConfig;
use digest_deployer::startup::Application;
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = DeployerConfig::load().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing(
        "digest-deployer",
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    let app = Application::build(config).await?;
    app.run_until_stopped().await?;

    Ok(())
}
