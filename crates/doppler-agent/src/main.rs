use anyhow::{Context, Result};
use doppler_agent::{AgentConfig, Collector, HttpTransport, Identity};
use doppler_provider::{Platform, ProviderRegistry};
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("doppler=info".parse()?))
        .init();

    let config_path = std::env::args().nth(1);
    let mut config = AgentConfig::load_or_default(config_path.as_deref())
        .with_context(|| format!("failed to load configuration from {config_path:?}"))?;
    config.apply_env();
    config.validate()?;

    let identity = Identity::new(config.api_key.clone(), config.hostname());
    let platform = Platform::current();
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        hostname = %identity.hostname,
        machine_id = %identity.machine_id,
        endpoint = %config.endpoint,
        platform = %platform,
        "doppler-agent starting"
    );

    let providers = ProviderRegistry::builtin()
        .resolve(platform, &config.disabled_providers)
        .context("failed to resolve providers")?;
    if providers.is_empty() {
        tracing::warn!(platform = %platform, "No metrics providers available");
        return Ok(());
    }
    for provider in &providers {
        let descriptor = provider.descriptor();
        tracing::info!(
            provider = descriptor.name,
            provides = %descriptor.provides(),
            "{}",
            descriptor.description
        );
    }

    let transport = HttpTransport::new(&config.endpoint, config.request_timeout())
        .context("failed to build HTTP client")?;
    let collector = Arc::new(Collector::new(
        identity,
        Arc::new(transport),
        config.collector_settings(),
    ));
    collector.start(providers).await;

    tracing::info!(
        send_interval_secs = config.send_interval_secs,
        max_store_samples = config.max_store_samples,
        "Starting send loop"
    );

    let send_loop = {
        let collector = Arc::clone(&collector);
        tokio::spawn(async move { collector.run_send_loop().await })
    };

    shutdown_signal().await;
    tracing::info!(pending = collector.pending(), "Shutting down gracefully");

    // Waits for a send already in flight before flushing. Provider tasks are
    // abandoned when the runtime drops.
    let flushed = collector.shutdown().await;
    send_loop.abort();
    match flushed {
        Ok(delivery) => tracing::info!(samples = delivery.total(), "Final flush delivered"),
        Err(e) => tracing::warn!(error = %e, "Final flush failed, pending data is lost"),
    }

    Ok(())
}
