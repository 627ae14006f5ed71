//! Portcullis gateway — entry point.
//!
//! Usage: `portcullis [config-path]` (default `gateway.yaml`).
//!
//! Configuration comes from the YAML file with environment overrides
//! applied on top (`GATEWAY_PORT`, `SSO_ENABLED`, `SSO_TYPE`,
//! `TELEMETRY_<i>_*`, …). Logging is controlled by `RUST_LOG`.
//!
//! Exit status: `0` on clean shutdown; non-zero on a fatal
//! construction/listen error or when the drain grace period expired with
//! requests still in flight.

use portcullis_gateway::server::{GatewayServer, ShutdownOutcome};
use portcullis_kernel::GatewayConfig;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("portcullis_gateway=info".parse().unwrap()),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "gateway.yaml".to_string());
    let config = match GatewayConfig::load(&config_path) {
        Ok(config) => config,
        Err(err) => {
            error!(path = %config_path, error = %err, "failed to load configuration");
            std::process::exit(1);
        }
    };

    info!(
        port = config.server.port,
        tls = config.server.tls_enabled,
        sso = config.sso.enabled,
        telemetry = config.telemetry.len(),
        routes = config.routes.len(),
        "configuration loaded"
    );

    let server = match GatewayServer::from_config(&config).await {
        Ok(server) => server,
        Err(err) => {
            error!(error = %err, "failed to construct gateway");
            std::process::exit(1);
        }
    };

    let bound = match server.bind().await {
        Ok(bound) => bound,
        Err(err) => {
            error!(error = %err, "failed to bind listener");
            std::process::exit(1);
        }
    };

    match bound.serve(shutdown_signal()).await {
        Ok(ShutdownOutcome::Clean) => info!("server stopped"),
        Ok(ShutdownOutcome::TimedOut) => {
            warn!("unclean shutdown: some requests were abandoned");
            std::process::exit(1);
        }
        Err(err) => {
            error!(error = %err, "server error");
            std::process::exit(1);
        }
    }
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => warn!("received interrupt"),
        _ = terminate => warn!("received termination signal"),
    }
}
