//! New Relic transaction provider.
//!
//! Records one transaction per request — name, status, duration — as
//! structured events under the `newrelic` target. Shipping them is the
//! agent's job; the gateway only guarantees every request is captured. The
//! license key is validated at configuration time.

use std::time::Instant;

use async_trait::async_trait;
use axum::Router;
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::MethodRouter;
use tracing::info;

use portcullis_kernel::TelemetryConfig;

use crate::error::StartupError;

use super::TelemetryProvider;

const DEFAULT_APP: &str = "portcullis";

/// Transaction-per-request recorder in New Relic's shape.
pub struct NewRelicProvider {
    app_name: String,
}

impl NewRelicProvider {
    pub fn new(entry: &TelemetryConfig) -> Self {
        let app_name = if entry.service.trim().is_empty() {
            DEFAULT_APP.to_string()
        } else {
            entry.service.clone()
        };
        Self { app_name }
    }
}

#[async_trait]
impl TelemetryProvider for NewRelicProvider {
    fn name(&self) -> &'static str {
        "newrelic"
    }

    async fn init(&self) -> Result<(), StartupError> {
        info!(target: "newrelic", app = %self.app_name, "transaction recording enabled");
        Ok(())
    }

    fn instrument(&self, router: Router) -> Router {
        router.layer(middleware::from_fn_with_state(
            self.app_name.clone(),
            transaction,
        ))
    }

    fn diagnostic_handler(&self) -> Option<MethodRouter> {
        None
    }
}

async fn transaction(State(app): State<String>, request: Request, next: Next) -> Response {
    let name = format!("{} {}", request.method(), request.uri().path());
    let start = Instant::now();

    let response = next.run(request).await;

    info!(
        target: "newrelic",
        app = %app,
        transaction = %name,
        status = response.status().as_u16(),
        duration_ms = start.elapsed().as_millis() as u64,
        "transaction"
    );
    response
}
