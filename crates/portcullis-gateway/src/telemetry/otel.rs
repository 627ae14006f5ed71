//! OpenTelemetry tracing provider.
//!
//! Exports one server span per request over OTLP/gRPC. `init` builds the
//! exporter and installs the tracer provider globally — the wiring the SDK
//! expects — and `shutdown` flushes pending batches so the last spans
//! survive process exit.

use async_trait::async_trait;
use axum::Router;
use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::MethodRouter;
use opentelemetry::trace::{Span, SpanKind, Status, Tracer};
use opentelemetry::{KeyValue, global};
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::trace::TracerProvider as SdkTracerProvider;
use opentelemetry_sdk::{Resource, runtime};
use parking_lot::Mutex;
use tracing::warn;

use portcullis_kernel::TelemetryConfig;

use crate::error::StartupError;

use super::TelemetryProvider;

const TRACER_NAME: &str = "portcullis-gateway";
const DEFAULT_SERVICE: &str = "portcullis";

/// OTLP span exporter provider. No diagnostic endpoint: spans go to the
/// collector, there is nothing to serve locally.
pub struct OtelProvider {
    endpoint: String,
    service: String,
    // Kept for the shutdown flush; None until init() has run.
    provider: Mutex<Option<SdkTracerProvider>>,
}

impl OtelProvider {
    pub fn new(entry: &TelemetryConfig) -> Self {
        let service = if entry.service.trim().is_empty() {
            DEFAULT_SERVICE.to_string()
        } else {
            entry.service.clone()
        };
        Self {
            endpoint: entry.endpoint.clone(),
            service,
            provider: Mutex::new(None),
        }
    }
}

#[async_trait]
impl TelemetryProvider for OtelProvider {
    fn name(&self) -> &'static str {
        "opentelemetry"
    }

    async fn init(&self) -> Result<(), StartupError> {
        let exporter = SpanExporter::builder()
            .with_tonic()
            .with_endpoint(&self.endpoint)
            .build()
            .map_err(|e| StartupError::ProviderInit {
                name: "opentelemetry",
                message: e.to_string(),
            })?;

        let provider = SdkTracerProvider::builder()
            .with_batch_exporter(exporter, runtime::Tokio)
            .with_resource(Resource::new(vec![KeyValue::new(
                "service.name",
                self.service.clone(),
            )]))
            .build();

        global::set_tracer_provider(provider.clone());
        *self.provider.lock() = Some(provider);
        Ok(())
    }

    fn instrument(&self, router: Router) -> Router {
        router.layer(middleware::from_fn(trace_request))
    }

    fn diagnostic_handler(&self) -> Option<MethodRouter> {
        None
    }

    async fn shutdown(&self) {
        let provider = self.provider.lock().take();
        if let Some(provider) = provider {
            if let Err(err) = provider.shutdown() {
                warn!(error = %err, "opentelemetry shutdown failed");
            }
        }
    }
}

async fn trace_request(request: Request, next: Next) -> Response {
    let tracer = global::tracer(TRACER_NAME);
    let mut span = tracer
        .span_builder(format!("{} {}", request.method(), request.uri().path()))
        .with_kind(SpanKind::Server)
        .start(&tracer);
    span.set_attribute(KeyValue::new(
        "http.request.method",
        request.method().to_string(),
    ));
    span.set_attribute(KeyValue::new("url.path", request.uri().path().to_string()));

    let response = next.run(request).await;

    span.set_attribute(KeyValue::new(
        "http.response.status_code",
        i64::from(response.status().as_u16()),
    ));
    if response.status().is_server_error() {
        span.set_status(Status::error("server error"));
    }
    span.end();
    response
}
