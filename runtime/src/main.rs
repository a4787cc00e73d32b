use anyhow::Result;
use loadpool_runtime::telemetry::SysinfoTelemetry;
use loadpool_runtime::{CapacityScore, LoadSampler, SamplerConfig};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = match SamplerConfig::try_from_env() {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "Invalid sampler configuration; using defaults");
            SamplerConfig::default()
        }
    };

    info!(
        initial_delay_ms = config.initial_delay.as_millis() as u64,
        interval_ms = config.interval.as_millis() as u64,
        "Starting load sampler"
    );

    let capacity = Arc::new(CapacityScore::new());
    let sampler = LoadSampler::new(Arc::new(SysinfoTelemetry::new()), capacity, config);
    let handle = sampler.spawn();

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    if let Err(e) = handle.shutdown().await {
        warn!(error = %e, "Load sampler task did not stop cleanly");
    }
    Ok(())
}
