//! QuantDash relay server - main entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use quantdash_core::{
    api::{self, AppState},
    config::Config,
    relay::Relay,
    telemetry::{self, TelemetryConfig},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::load()?;

    telemetry::init_telemetry(&TelemetryConfig {
        service_name: "quantdash-relay".to_string(),
        logging: config.logging.clone(),
        metrics: config.metrics.clone(),
    })?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting QuantDash relay"
    );

    let relay = Arc::new(Relay::from_config(&config)?);
    for capability in relay.registry().iter() {
        tracing::info!(
            capability = %capability.name,
            candidates = capability.candidates.len(),
            health_targets = capability.health_targets.len(),
            preset = capability.is_static(),
            "Capability registered"
        );
    }
    if config.relay.debug {
        tracing::warn!("Debug envelopes enabled; upstream headers are exposed to clients");
    }

    let app = api::build_router(AppState::new(relay));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!(address = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
