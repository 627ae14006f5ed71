//! Telemetry provider abstraction and the provider chain.
//!
//! ```text
//! Request  ──► provider[0] ──► provider[1] ──► … ──► auth ──► proxy
//! Response ◄── provider[0] ◄── provider[1] ◄── …
//! ```
//!
//! The chain is fixed at startup. Providers are initialised in configuration
//! order and the first failure is fatal — the gateway never starts partially
//! instrumented. Middleware nests so the **first configured provider is
//! outermost**: it sees the raw request first and measures total latency,
//! including every inner provider's overhead.

mod appdynamics;
mod newrelic;
mod noop;
mod otel;
mod prometheus;

pub use appdynamics::AppDynamicsProvider;
pub use newrelic::NewRelicProvider;
pub use noop::NoopProvider;
pub use otel::OtelProvider;
pub use prometheus::PrometheusProvider;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::routing::MethodRouter;
use tracing::{debug, info, warn};

use portcullis_kernel::{TelemetryConfig, TelemetryKind};

use crate::error::StartupError;

// ─────────────────────────────────────────────────────────────────────────────
// TelemetryProvider trait
// ─────────────────────────────────────────────────────────────────────────────

/// Contract for a single observability backend.
///
/// Implementations must be `Send + Sync`; one instance is shared read-only
/// across every request task.
#[async_trait]
pub trait TelemetryProvider: Send + Sync {
    /// Stable identifier, used in logs and as the default diagnostic path.
    fn name(&self) -> &'static str;

    /// One-time startup initialisation. Runs before the listener opens; any
    /// error is fatal.
    async fn init(&self) -> Result<(), StartupError>;

    /// Wrap the router with this provider's middleware.
    ///
    /// Implementations must not consume or mutate the request body; they
    /// observe the response's status and timing.
    fn instrument(&self, router: Router) -> Router;

    /// Handler for the provider's diagnostic endpoint, if it has one.
    fn diagnostic_handler(&self) -> Option<MethodRouter>;

    /// Path the diagnostic endpoint is served under.
    fn diagnostic_path(&self) -> String {
        format!("/{}", self.name())
    }

    /// Flush and release backend resources during shutdown.
    async fn shutdown(&self) {}
}

// ─────────────────────────────────────────────────────────────────────────────
// Factory
// ─────────────────────────────────────────────────────────────────────────────

/// Select a provider for one validated telemetry entry.
///
/// A disabled entry or the explicit `none` kind resolves to
/// [`NoopProvider`], so the chain shape always matches the configuration —
/// never a silently skipped slot. Unknown kind strings cannot reach this
/// function: [`TelemetryKind`] is a closed enum and rejects them at parse
/// time.
pub fn provider_for(entry: &TelemetryConfig) -> Result<Arc<dyn TelemetryProvider>, StartupError> {
    if !entry.enabled {
        return Ok(Arc::new(NoopProvider));
    }
    match entry.kind {
        TelemetryKind::None => Ok(Arc::new(NoopProvider)),
        TelemetryKind::Prometheus => Ok(Arc::new(PrometheusProvider::new(entry)?)),
        TelemetryKind::Opentelemetry => Ok(Arc::new(OtelProvider::new(entry))),
        TelemetryKind::Newrelic => Ok(Arc::new(NewRelicProvider::new(entry))),
        TelemetryKind::Appdynamics => Ok(Arc::new(AppDynamicsProvider::new(entry))),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TelemetryChain
// ─────────────────────────────────────────────────────────────────────────────

/// Fixed-order chain of telemetry providers.
pub struct TelemetryChain {
    providers: Vec<Arc<dyn TelemetryProvider>>,
}

impl TelemetryChain {
    /// Build a chain from already-constructed providers, preserving order.
    pub fn new(providers: Vec<Arc<dyn TelemetryProvider>>) -> Self {
        Self { providers }
    }

    /// Build a chain from the validated telemetry entries.
    pub fn from_config(entries: &[TelemetryConfig]) -> Result<Self, StartupError> {
        let providers = entries
            .iter()
            .map(provider_for)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(providers))
    }

    /// Initialise every provider in configuration order, stopping at the
    /// first failure.
    pub async fn init(&self) -> Result<(), StartupError> {
        for provider in &self.providers {
            provider.init().await?;
            info!(provider = provider.name(), "telemetry provider initialised");
        }
        Ok(())
    }

    /// Install provider middleware around `router`.
    ///
    /// Layers are applied in reverse configuration order: the last layer
    /// added to an axum router becomes the outermost, so reversing keeps
    /// the first configured provider outermost.
    pub fn instrument(&self, mut router: Router) -> Router {
        for provider in self.providers.iter().rev() {
            router = provider.instrument(router);
        }
        router
    }

    /// Register diagnostic endpoints for the providers exposing one.
    ///
    /// If two providers resolve to the same path, the first configured one
    /// keeps it.
    pub fn register_diagnostics(&self, mut router: Router) -> Router {
        let mut taken: HashSet<String> = HashSet::new();
        for provider in &self.providers {
            if let Some(handler) = provider.diagnostic_handler() {
                let path = provider.diagnostic_path();
                if !taken.insert(path.clone()) {
                    warn!(provider = provider.name(), path = %path, "diagnostic path already taken; skipping");
                    continue;
                }
                debug!(provider = provider.name(), path = %path, "registering diagnostic endpoint");
                router = router.route(&path, handler);
            }
        }
        router
    }

    /// Paths the chain's diagnostic endpoints occupy.
    pub fn diagnostic_paths(&self) -> Vec<String> {
        self.providers
            .iter()
            .filter(|p| p.diagnostic_handler().is_some())
            .map(|p| p.diagnostic_path())
            .collect()
    }

    /// Flush providers in chain order during `Draining → Stopped`.
    pub async fn shutdown(&self) {
        for provider in &self.providers {
            provider.shutdown().await;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Provider names in chain order.
    pub fn names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
