//! Gateway server assembly and lifecycle.
//!
//! Lifecycle: `Constructing → Ready → Serving → Draining → Stopped`, logged
//! at each transition. Construction failures are fatal before anything is
//! served; shutdown drains in-flight requests for a bounded grace period
//! and reports whether the drain finished cleanly.
//!
//! Composition order per request: telemetry (outermost, global — rejected
//! requests are measured too) → per-route auth → proxy. The route table is
//! exact-path; anything unmatched falls through to axum's generic 404.

use std::collections::HashSet;
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::Request;
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::{any, get};
use tokio::net::TcpListener;
use tracing::{info, warn};
use url::Url;

use portcullis_kernel::{AuthProvider, ConfigError, GatewayConfig};

use crate::auth::{self, AuthGate, enforce_policy};
use crate::error::StartupError;
use crate::proxy::UpstreamForwarder;
use crate::telemetry::TelemetryChain;

// ─────────────────────────────────────────────────────────────────────────────
// Lifecycle
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle states, logged at each transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Constructing,
    Ready,
    Serving,
    Draining,
    Stopped,
}

/// How serving ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every in-flight request finished within the grace period.
    Clean,
    /// The grace period elapsed with requests still running; they were
    /// abandoned and the remaining connections force-closed.
    TimedOut,
}

// ─────────────────────────────────────────────────────────────────────────────
// GatewayServer
// ─────────────────────────────────────────────────────────────────────────────

/// A fully constructed gateway: validated config, auth provider, telemetry
/// chain, and route table, ready to bind.
pub struct GatewayServer {
    router: Router,
    telemetry: Arc<TelemetryChain>,
    port: u16,
    grace: Duration,
}

impl GatewayServer {
    /// Construct the full request pipeline from a configuration, building
    /// the providers from their config blocks.
    pub async fn from_config(config: &GatewayConfig) -> Result<Self, StartupError> {
        let provider = auth::provider_for(&config.sso)?;
        if config.sso.enabled {
            info!(provider = provider.name(), "sso enabled");
        } else {
            warn!("sso disabled: running without authentication");
        }
        let telemetry = TelemetryChain::from_config(&config.telemetry)?;
        Self::from_parts(config, provider, telemetry).await
    }

    /// Construct the pipeline from explicit parts.
    ///
    /// This is the dependency-injection surface: the provider and chain are
    /// built once by the caller and threaded through the middleware
    /// builders — there is no process-global provider state to swap.
    pub async fn from_parts(
        config: &GatewayConfig,
        provider: Arc<dyn AuthProvider>,
        telemetry: TelemetryChain,
    ) -> Result<Self, StartupError> {
        info!(state = ?Lifecycle::Constructing, "constructing gateway");
        config.validate()?;

        let telemetry = Arc::new(telemetry);
        telemetry.init().await?;

        let forwarder = Arc::new(UpstreamForwarder::new(config.server.tls_enabled)?);
        let router = build_router(config, provider, &telemetry, forwarder)?;

        Ok(Self {
            router,
            telemetry,
            port: config.server.port,
            grace: Duration::from_secs(config.server.shutdown_grace_secs),
        })
    }

    /// Override the drain grace period (mainly for tests).
    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// A clone of the composed router, for driving the pipeline without a
    /// listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Bind the configured port on all interfaces. `Ready` once this
    /// returns.
    pub async fn bind(self) -> Result<BoundGateway, StartupError> {
        let port = self.port;
        self.bind_to(SocketAddr::from(([0, 0, 0, 0], port))).await
    }

    /// Bind a specific address (tests bind an ephemeral loopback port).
    pub async fn bind_to(self, addr: SocketAddr) -> Result<BoundGateway, StartupError> {
        let listener = TcpListener::bind(addr).await.map_err(StartupError::Bind)?;
        info!(state = ?Lifecycle::Ready, addr = ?listener.local_addr().ok(), "listener bound");
        Ok(BoundGateway {
            listener,
            router: self.router,
            telemetry: self.telemetry,
            grace: self.grace,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BoundGateway
// ─────────────────────────────────────────────────────────────────────────────

/// A gateway with its listener bound, ready to serve.
pub struct BoundGateway {
    listener: TcpListener,
    router: Router,
    telemetry: Arc<TelemetryChain>,
    grace: Duration,
}

impl BoundGateway {
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `shutdown` resolves or the listener fails, then drain.
    ///
    /// On shutdown the listener stops accepting immediately; in-flight
    /// requests get the grace period to finish before the remaining
    /// connections are abandoned. Telemetry is flushed either way.
    pub async fn serve<F>(self, shutdown: F) -> Result<ShutdownOutcome, std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!(state = ?Lifecycle::Serving, "gateway serving");

        let (drain_tx, drain_rx) = tokio::sync::oneshot::channel::<()>();
        let server = axum::serve(
            self.listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = drain_rx.await;
        });

        let mut serving = tokio::spawn(server.into_future());

        let outcome = tokio::select! {
            result = &mut serving => {
                // The accept loop ended on its own — listener failure.
                match result {
                    Ok(Ok(())) => Ok(ShutdownOutcome::Clean),
                    Ok(Err(err)) => Err(err),
                    Err(join_err) => Err(std::io::Error::other(join_err)),
                }
            }
            () = shutdown => {
                info!(
                    state = ?Lifecycle::Draining,
                    grace_secs = self.grace.as_secs(),
                    "draining in-flight requests"
                );
                let _ = drain_tx.send(());
                match tokio::time::timeout(self.grace, &mut serving).await {
                    Ok(Ok(Ok(()))) => Ok(ShutdownOutcome::Clean),
                    Ok(Ok(Err(err))) => Err(err),
                    Ok(Err(join_err)) => Err(std::io::Error::other(join_err)),
                    Err(_elapsed) => {
                        warn!("grace period elapsed; abandoning in-flight requests");
                        serving.abort();
                        Ok(ShutdownOutcome::TimedOut)
                    }
                }
            }
        };

        self.telemetry.shutdown().await;
        info!(state = ?Lifecycle::Stopped, "gateway stopped");
        outcome
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Router assembly
// ─────────────────────────────────────────────────────────────────────────────

fn build_router(
    config: &GatewayConfig,
    provider: Arc<dyn AuthProvider>,
    telemetry: &TelemetryChain,
    forwarder: Arc<UpstreamForwarder>,
) -> Result<Router, StartupError> {
    // Health and diagnostics are registered before the telemetry layers are
    // applied, so they are measured like every proxied route. Health is the
    // one path exempt from auth.
    let mut router = Router::new().route("/health", get(health));
    router = telemetry.register_diagnostics(router);

    // Registering a duplicate path panics inside axum; routes that shadow a
    // gateway-owned path have to be rejected here, where the diagnostic
    // paths are finally known.
    let mut taken: HashSet<String> = telemetry.diagnostic_paths().into_iter().collect();
    taken.insert("/health".to_string());

    for route in &config.routes {
        if taken.contains(&route.path) {
            return Err(ConfigError::ReservedRoutePath(route.path.clone()).into());
        }
        let upstream = Url::parse(&route.upstream)
            .map_err(|e| ConfigError::InvalidUpstream(route.path.clone(), e.to_string()))?;
        let upstream = Arc::new(upstream);
        let forwarder = forwarder.clone();

        let handler = any(move |request: Request| {
            let forwarder = forwarder.clone();
            let upstream = upstream.clone();
            async move {
                forwarder
                    .forward(&upstream, request)
                    .await
                    .unwrap_or_else(|err| err.into_response())
            }
        });

        let gate = AuthGate {
            provider: provider.clone(),
            policy: route.auth_policy,
        };
        info!(
            path = %route.path,
            upstream = %route.upstream,
            policy = ?route.auth_policy,
            "route registered"
        );
        router = router.route(
            &route.path,
            handler.layer(middleware::from_fn_with_state(gate, enforce_policy)),
        );
    }

    Ok(telemetry.instrument(router))
}

/// `GET /health` — liveness probe. No auth, no side effects.
async fn health() -> &'static str {
    "OK"
}

// =============================================================================
// Tests
// =============================================================================
