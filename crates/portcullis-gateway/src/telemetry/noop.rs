//! Pass-through provider for disabled chain entries.

use async_trait::async_trait;
use axum::Router;
use axum::routing::MethodRouter;

use crate::error::StartupError;

use super::TelemetryProvider;

/// Provider that does nothing: no middleware, no diagnostic route.
#[derive(Debug, Default)]
pub struct NoopProvider;

#[async_trait]
impl TelemetryProvider for NoopProvider {
    fn name(&self) -> &'static str {
        "noop"
    }

    async fn init(&self) -> Result<(), StartupError> {
        Ok(())
    }

    fn instrument(&self, router: Router) -> Router {
        router
    }

    fn diagnostic_handler(&self) -> Option<MethodRouter> {
        None
    }
}
