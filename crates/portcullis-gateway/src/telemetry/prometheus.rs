//! Prometheus metrics provider.
//!
//! Keeps its own [`Registry`] so gateway metrics never collide with anything
//! else in the process. The middleware records a request counter and a
//! latency histogram; the diagnostic endpoint renders the text exposition
//! format for scraping.

use std::time::Instant;

use async_trait::async_trait;
use axum::Router;
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodRouter, get};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use tracing::error;

use portcullis_kernel::TelemetryConfig;

use crate::error::StartupError;

use super::TelemetryProvider;

const DEFAULT_PATH: &str = "/prometheus";

/// Cloneable metric handles shared with the middleware.
#[derive(Clone)]
struct HttpMetrics {
    requests: IntCounterVec,
    latency: HistogramVec,
}

/// Prometheus provider: counter + histogram + scrape endpoint.
pub struct PrometheusProvider {
    registry: Registry,
    metrics: HttpMetrics,
    path: String,
}

impl PrometheusProvider {
    pub fn new(entry: &TelemetryConfig) -> Result<Self, StartupError> {
        let requests = IntCounterVec::new(
            Opts::new("http_requests_total", "Total requests served by the gateway"),
            &["path", "method", "status"],
        )
        .map_err(init_error)?;
        let latency = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "Request latency as observed by the gateway",
            ),
            &["path", "method"],
        )
        .map_err(init_error)?;

        let path = if entry.prom_path.trim().is_empty() {
            DEFAULT_PATH.to_string()
        } else {
            entry.prom_path.clone()
        };

        Ok(Self {
            registry: Registry::new(),
            metrics: HttpMetrics { requests, latency },
            path,
        })
    }
}

fn init_error(err: prometheus::Error) -> StartupError {
    StartupError::ProviderInit {
        name: "prometheus",
        message: err.to_string(),
    }
}

#[async_trait]
impl TelemetryProvider for PrometheusProvider {
    fn name(&self) -> &'static str {
        "prometheus"
    }

    async fn init(&self) -> Result<(), StartupError> {
        self.registry
            .register(Box::new(self.metrics.requests.clone()))
            .map_err(init_error)?;
        self.registry
            .register(Box::new(self.metrics.latency.clone()))
            .map_err(init_error)?;
        Ok(())
    }

    fn instrument(&self, router: Router) -> Router {
        router.layer(middleware::from_fn_with_state(self.metrics.clone(), record))
    }

    fn diagnostic_handler(&self) -> Option<MethodRouter> {
        let registry = self.registry.clone();
        Some(get(move || {
            let registry = registry.clone();
            async move { render(&registry) }
        }))
    }

    fn diagnostic_path(&self) -> String {
        self.path.clone()
    }
}

async fn record(State(metrics): State<HttpMetrics>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let method = request.method().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    metrics
        .requests
        .with_label_values(&[&path, &method, response.status().as_str()])
        .inc();
    metrics
        .latency
        .with_label_values(&[&path, &method])
        .observe(start.elapsed().as_secs_f64());
    response
}

fn render(registry: &Registry) -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&registry.gather(), &mut buffer) {
        error!(error = %err, "failed to encode prometheus metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, "encoding failure").into_response();
    }
    (
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}

// =============================================================================
// Tests
// =============================================================================
