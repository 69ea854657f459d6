//! Stdio bridge binary for a realtime tool-calling session.
//!
//! Reads realtime events as newline-delimited JSON from stdin, reconciles
//! tool calls against the configured function-call backend, and writes
//! outbound events to stdout.
//!
//! All tracing/diagnostic output goes to stderr so that stdout remains a
//! clean JSON protocol channel.

use std::sync::Arc;

use voxlink::config::BridgeConfig;
use voxlink::executor::HttpToolExecutor;
use voxlink::tools::ToolRegistry;
use voxlink::transport::run_stdio_bridge;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let path = BridgeConfig::resolve_config_path();
    let mut config = BridgeConfig::load_or_default(&path)
        .map_err(|e| anyhow::anyhow!("failed to load config from {}: {e}", path.display()))?;
    config
        .apply_env_overrides()
        .map_err(|e| anyhow::anyhow!("invalid environment override: {e}"))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    tracing::info!(
        backend = %config.backend.base_url,
        timeout_ms = config.dispatch.timeout_ms,
        "voxlink-bridge starting"
    );

    let tools = Arc::new(ToolRegistry::with_defaults());
    let executor = HttpToolExecutor::new(&config.backend, Arc::clone(&tools))
        .map_err(|e| anyhow::anyhow!("failed to create tool executor: {e}"))?;

    run_stdio_bridge(&config, tools, Arc::new(executor))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "voxlink-bridge exited with error");
            anyhow::anyhow!("voxlink-bridge failed: {e}")
        })?;

    tracing::info!("voxlink-bridge shut down cleanly");
    Ok(())
}
