//! AppDynamics provider slot.
//!
//! The AppDynamics machine agent instruments the process from the outside;
//! the in-gateway variant only reserves the provider's position in the
//! chain so a configured deployment keeps its declared shape.

use async_trait::async_trait;
use axum::Router;
use axum::routing::MethodRouter;
use tracing::debug;

use portcullis_kernel::TelemetryConfig;

use crate::error::StartupError;

use super::TelemetryProvider;

/// Declared pass-through variant.
pub struct AppDynamicsProvider;

impl AppDynamicsProvider {
    pub fn new(_entry: &TelemetryConfig) -> Self {
        Self
    }
}

#[async_trait]
impl TelemetryProvider for AppDynamicsProvider {
    fn name(&self) -> &'static str {
        "appdynamics"
    }

    async fn init(&self) -> Result<(), StartupError> {
        debug!("appdynamics slot active; instrumentation is agent-side");
        Ok(())
    }

    fn instrument(&self, router: Router) -> Router {
        router
    }

    fn diagnostic_handler(&self) -> Option<MethodRouter> {
        None
    }
}
