//! End-to-end tests: a bound gateway in front of mock upstreams.
//!
//! Each test builds a real listener pair (gateway + upstream) on loopback
//! ephemeral ports and drives it with a plain HTTP client, exercising the
//! composed pipeline exactly as a deployment would.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::MethodRouter;

use portcullis_gateway::server::{GatewayServer, ShutdownOutcome};
use portcullis_gateway::telemetry::{PrometheusProvider, TelemetryChain, TelemetryProvider};
use portcullis_kernel::{
    AuthContext, AuthError, AuthPolicy, AuthProvider, GatewayConfig, RouteConfig, TelemetryConfig,
};

// ─────────────────────────────────────────────────────────────────────────────
// Test fixtures
// ─────────────────────────────────────────────────────────────────────────────

/// Serve `app` on an ephemeral loopback port.
async fn spawn_upstream(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Upstream that counts hits and replies with a fixed body.
fn counting_upstream(hits: Arc<AtomicUsize>) -> Router {
    Router::new().fallback(move || {
        let hits = hits.clone();
        async move {
            hits.fetch_add(1, Ordering::SeqCst);
            "upstream-ok"
        }
    })
}

/// Accepts exactly one bearer token; counts every authenticate() call.
struct SingleTokenProvider {
    valid: &'static str,
    calls: AtomicUsize,
}

impl SingleTokenProvider {
    fn new(valid: &'static str) -> Arc<Self> {
        Arc::new(Self {
            valid,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl AuthProvider for SingleTokenProvider {
    fn name(&self) -> &'static str {
        "single-token"
    }

    fn login_url(&self) -> String {
        "/login".to_string()
    }

    async fn authenticate(&self, token: &str) -> Result<AuthContext, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if token == self.valid {
            Ok(AuthContext {
                user_id: "alice".to_string(),
                email: None,
                roles: vec!["user".to_string()],
                token: Some(token.to_string()),
            })
        } else {
            Err(AuthError::InvalidToken("unknown token".to_string()))
        }
    }
}

/// Telemetry provider that records the latency its middleware observed.
struct RecordingProvider {
    label: &'static str,
    observed: Arc<Mutex<Option<Duration>>>,
}

impl RecordingProvider {
    fn new(label: &'static str) -> (Self, Arc<Mutex<Option<Duration>>>) {
        let observed = Arc::new(Mutex::new(None));
        (
            Self {
                label,
                observed: observed.clone(),
            },
            observed,
        )
    }
}

async fn record_latency(
    State(slot): State<Arc<Mutex<Option<Duration>>>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let response = next.run(request).await;
    *slot.lock().unwrap() = Some(start.elapsed());
    response
}

#[async_trait]
impl TelemetryProvider for RecordingProvider {
    fn name(&self) -> &'static str {
        self.label
    }

    async fn init(&self) -> Result<(), portcullis_gateway::error::StartupError> {
        Ok(())
    }

    fn instrument(&self, router: Router) -> Router {
        router.layer(middleware::from_fn_with_state(
            self.observed.clone(),
            record_latency,
        ))
    }

    fn diagnostic_handler(&self) -> Option<MethodRouter> {
        None
    }
}

/// Telemetry provider whose middleware fails every request outright.
struct FailingProvider;

#[async_trait]
impl TelemetryProvider for FailingProvider {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn init(&self) -> Result<(), portcullis_gateway::error::StartupError> {
        Ok(())
    }

    fn instrument(&self, router: Router) -> Router {
        router.layer(middleware::from_fn(
            |_request: Request, _next: Next| async move {
                (StatusCode::INTERNAL_SERVER_ERROR, "instrumentation failure").into_response()
            },
        ))
    }

    fn diagnostic_handler(&self) -> Option<MethodRouter> {
        None
    }
}

/// Build, bind, and serve a gateway; returns its base URL.
async fn start_gateway(
    config: &GatewayConfig,
    provider: Arc<dyn AuthProvider>,
    telemetry: TelemetryChain,
) -> String {
    let server = GatewayServer::from_parts(config, provider, telemetry)
        .await
        .unwrap();
    let bound = server
        .bind_to("127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let addr = bound.local_addr().unwrap();
    tokio::spawn(bound.serve(std::future::pending()));
    format!("http://{addr}")
}

fn route_to(upstream: SocketAddr, path: &str, policy: AuthPolicy) -> RouteConfig {
    RouteConfig::new(path, format!("http://{upstream}")).with_policy(policy)
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Health
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_is_idempotent_and_never_consults_auth() {
    let provider = SingleTokenProvider::new("good");
    let config = GatewayConfig::new(8080);
    let base = start_gateway(&config, provider.clone(), TelemetryChain::new(Vec::new())).await;

    for _ in 0..3 {
        let response = client().get(format!("{base}/health")).send().await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await.unwrap(), "OK");
    }
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth policies
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn required_policy_blocks_unauthenticated_traffic_before_the_upstream() {
    let hits = Arc::new(AtomicUsize::new(0));
    let upstream = spawn_upstream(counting_upstream(hits.clone())).await;
    let provider = SingleTokenProvider::new("good");
    let config =
        GatewayConfig::new(8080).with_route(route_to(upstream, "/svc", AuthPolicy::Required));
    let base = start_gateway(&config, provider, TelemetryChain::new(Vec::new())).await;

    // Missing token.
    let response = client().get(format!("{base}/svc")).send().await.unwrap();
    assert_eq!(response.status(), 401);

    // Invalid token.
    let response = client()
        .get(format!("{base}/svc"))
        .bearer_auth("forged")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    // The upstream never saw either request.
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    // A valid token goes through.
    let response = client()
        .get(format!("{base}/svc"))
        .bearer_auth("good")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "upstream-ok");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn none_policy_ignores_authorization_content() {
    let hits = Arc::new(AtomicUsize::new(0));
    let upstream = spawn_upstream(counting_upstream(hits.clone())).await;
    let provider = SingleTokenProvider::new("good");
    let config = GatewayConfig::new(8080).with_route(route_to(upstream, "/open", AuthPolicy::None));
    let base = start_gateway(&config, provider.clone(), TelemetryChain::new(Vec::new())).await;

    let response = client()
        .get(format!("{base}/open"))
        .header("authorization", "utter garbage")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn optional_policy_forwards_the_anonymous_identity() {
    // Upstream echoes the forwarded user header.
    let app = Router::new().fallback(|headers: HeaderMap| async move {
        headers
            .get("x-forwarded-user")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("missing")
            .to_string()
    });
    let upstream = spawn_upstream(app).await;
    let provider = SingleTokenProvider::new("good");
    let config =
        GatewayConfig::new(8080).with_route(route_to(upstream, "/svc", AuthPolicy::Optional));
    let base = start_gateway(&config, provider, TelemetryChain::new(Vec::new())).await;

    let response = client().get(format!("{base}/svc")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "anonymous");
}

#[tokio::test]
async fn optional_policy_rejects_a_presented_invalid_token() {
    let hits = Arc::new(AtomicUsize::new(0));
    let upstream = spawn_upstream(counting_upstream(hits.clone())).await;
    let provider = SingleTokenProvider::new("good");
    let config =
        GatewayConfig::new(8080).with_route(route_to(upstream, "/svc", AuthPolicy::Optional));
    let base = start_gateway(&config, provider, TelemetryChain::new(Vec::new())).await;

    let response = client()
        .get(format!("{base}/svc"))
        .bearer_auth("forged")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Proxy behavior
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn round_trip_preserves_status_headers_and_body() {
    let app = Router::new().fallback(|| async {
        (
            StatusCode::IM_A_TEAPOT,
            [("x-upstream-flavor", "earl-grey")],
            "short and stout",
        )
    });
    let upstream = spawn_upstream(app).await;
    let config = GatewayConfig::new(8080).with_route(route_to(upstream, "/tea", AuthPolicy::None));
    let base = start_gateway(
        &config,
        Arc::new(portcullis_gateway::auth::NoAuthProvider),
        TelemetryChain::new(Vec::new()),
    )
    .await;

    let response = client().get(format!("{base}/tea")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    assert_eq!(
        response.headers().get("x-upstream-flavor").unwrap(),
        "earl-grey"
    );
    assert_eq!(response.text().await.unwrap(), "short and stout");
}

#[tokio::test]
async fn request_bodies_and_query_strings_reach_the_upstream() {
    let app = Router::new().fallback(|request: Request| async move {
        let query = request.uri().query().unwrap_or("").to_string();
        let body = axum::body::to_bytes(request.into_body(), 64 * 1024)
            .await
            .unwrap();
        format!("{}|{}", query, String::from_utf8_lossy(&body))
    });
    let upstream = spawn_upstream(app).await;
    let config = GatewayConfig::new(8080).with_route(route_to(upstream, "/echo", AuthPolicy::None));
    let base = start_gateway(
        &config,
        Arc::new(portcullis_gateway::auth::NoAuthProvider),
        TelemetryChain::new(Vec::new()),
    )
    .await;

    let response = client()
        .post(format!("{base}/echo?page=2&sort=asc"))
        .body("payload bytes")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.text().await.unwrap(),
        "page=2&sort=asc|payload bytes"
    );
}

#[tokio::test]
async fn forwarding_headers_are_added() {
    let app = Router::new().fallback(|headers: HeaderMap| async move {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("missing")
                .to_string()
        };
        format!(
            "proto={};host={};for={}",
            get("x-forwarded-proto"),
            get("x-forwarded-host"),
            get("x-forwarded-for"),
        )
    });
    let upstream = spawn_upstream(app).await;
    let config = GatewayConfig::new(8080).with_route(route_to(upstream, "/hdr", AuthPolicy::None));
    let base = start_gateway(
        &config,
        Arc::new(portcullis_gateway::auth::NoAuthProvider),
        TelemetryChain::new(Vec::new()),
    )
    .await;

    let body = client()
        .get(format!("{base}/hdr"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.starts_with("proto=http;"));
    assert!(body.contains("host=127.0.0.1:"));
    assert!(body.contains("for=127.0.0.1"));
}

#[tokio::test]
async fn unmatched_path_is_a_generic_not_found() {
    let config = GatewayConfig::new(8080);
    let base = start_gateway(
        &config,
        Arc::new(portcullis_gateway::auth::NoAuthProvider),
        TelemetryChain::new(Vec::new()),
    )
    .await;

    let response = client()
        .get(format!("{base}/no/such/route"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn dead_upstream_yields_a_generic_bad_gateway() {
    // Nothing listens on port 9 ("discard") on loopback.
    let config = GatewayConfig::new(8080)
        .with_route(RouteConfig::new("/dead", "http://127.0.0.1:9").with_policy(AuthPolicy::None));
    let base = start_gateway(
        &config,
        Arc::new(portcullis_gateway::auth::NoAuthProvider),
        TelemetryChain::new(Vec::new()),
    )
    .await;

    let response = client().get(format!("{base}/dead")).send().await.unwrap();
    assert_eq!(response.status(), 502);
    let body = response.text().await.unwrap();
    assert!(body.contains("BAD_GATEWAY"));
    // The upstream address is server-side knowledge only.
    assert!(!body.contains("127.0.0.1:9"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Telemetry chain
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn first_configured_provider_measures_at_least_the_inner_one() {
    let app = Router::new().fallback(|| async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        "slow"
    });
    let upstream = spawn_upstream(app).await;

    let (outer, outer_observed) = RecordingProvider::new("outer");
    let (inner, inner_observed) = RecordingProvider::new("inner");
    let chain = TelemetryChain::new(vec![Arc::new(outer), Arc::new(inner)]);

    let config = GatewayConfig::new(8080).with_route(route_to(upstream, "/svc", AuthPolicy::None));
    let base = start_gateway(
        &config,
        Arc::new(portcullis_gateway::auth::NoAuthProvider),
        chain,
    )
    .await;

    let response = client().get(format!("{base}/svc")).send().await.unwrap();
    assert_eq!(response.status(), 200);

    let outer_latency = outer_observed.lock().unwrap().expect("outer not recorded");
    let inner_latency = inner_observed.lock().unwrap().expect("inner not recorded");
    assert!(
        outer_latency >= inner_latency,
        "outer {outer_latency:?} must include inner {inner_latency:?}"
    );
    assert!(inner_latency >= Duration::from_millis(50));
}

#[tokio::test]
async fn outer_provider_completes_when_an_inner_one_fails() {
    let upstream = spawn_upstream(counting_upstream(Arc::new(AtomicUsize::new(0)))).await;

    let (outer, outer_observed) = RecordingProvider::new("outer");
    let chain = TelemetryChain::new(vec![Arc::new(outer), Arc::new(FailingProvider)]);

    let config = GatewayConfig::new(8080).with_route(route_to(upstream, "/svc", AuthPolicy::None));
    let base = start_gateway(
        &config,
        Arc::new(portcullis_gateway::auth::NoAuthProvider),
        chain,
    )
    .await;

    let response = client().get(format!("{base}/svc")).send().await.unwrap();
    assert_eq!(response.status(), 500);
    assert!(outer_observed.lock().unwrap().is_some());
}

#[tokio::test]
async fn auth_rejections_are_still_measured() {
    let upstream = spawn_upstream(counting_upstream(Arc::new(AtomicUsize::new(0)))).await;

    let (recorder, observed) = RecordingProvider::new("recorder");
    let chain = TelemetryChain::new(vec![Arc::new(recorder)]);

    let provider = SingleTokenProvider::new("good");
    let config =
        GatewayConfig::new(8080).with_route(route_to(upstream, "/svc", AuthPolicy::Required));
    let base = start_gateway(&config, provider, chain).await;

    let response = client().get(format!("{base}/svc")).send().await.unwrap();
    assert_eq!(response.status(), 401);
    assert!(observed.lock().unwrap().is_some());
}

#[tokio::test]
async fn prometheus_diagnostic_endpoint_serves_metrics() {
    let upstream = spawn_upstream(counting_upstream(Arc::new(AtomicUsize::new(0)))).await;

    let entry = TelemetryConfig {
        enabled: true,
        prom_path: "/metrics".to_string(),
        ..TelemetryConfig::default()
    };
    let chain = TelemetryChain::new(vec![Arc::new(PrometheusProvider::new(&entry).unwrap())]);

    let config = GatewayConfig::new(8080).with_route(route_to(upstream, "/svc", AuthPolicy::None));
    let base = start_gateway(
        &config,
        Arc::new(portcullis_gateway::auth::NoAuthProvider),
        chain,
    )
    .await;

    // Drive one request through the pipeline so the counter has a sample.
    let response = client().get(format!("{base}/svc")).send().await.unwrap();
    assert_eq!(response.status(), 200);

    let body = client()
        .get(format!("{base}/metrics"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("http_requests_total"));
    assert!(body.contains("/svc"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Shutdown
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn shutdown_waits_for_in_flight_requests() {
    let app = Router::new().fallback(|| async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        "made it"
    });
    let upstream = spawn_upstream(app).await;

    let config = GatewayConfig::new(8080).with_route(route_to(upstream, "/slow", AuthPolicy::None));
    let server = GatewayServer::from_parts(
        &config,
        Arc::new(portcullis_gateway::auth::NoAuthProvider),
        TelemetryChain::new(Vec::new()),
    )
    .await
    .unwrap()
    .with_grace_period(Duration::from_secs(5));
    let bound = server
        .bind_to("127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let addr = bound.local_addr().unwrap();

    let (trigger, signal) = tokio::sync::oneshot::channel::<()>();
    let serving = tokio::spawn(bound.serve(async move {
        let _ = signal.await;
    }));

    let request = tokio::spawn(async move {
        client()
            .get(format!("http://{addr}/slow"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap()
    });

    // Let the request reach the upstream, then ask for shutdown.
    tokio::time::sleep(Duration::from_millis(50)).await;
    trigger.send(()).unwrap();

    let outcome = serving.await.unwrap().unwrap();
    assert_eq!(outcome, ShutdownOutcome::Clean);
    assert_eq!(request.await.unwrap(), "made it");
}

#[tokio::test]
async fn shutdown_abandons_requests_that_exceed_the_grace_period() {
    let app = Router::new().fallback(|| async {
        tokio::time::sleep(Duration::from_secs(30)).await;
        "never returned"
    });
    let upstream = spawn_upstream(app).await;

    let config =
        GatewayConfig::new(8080).with_route(route_to(upstream, "/hang", AuthPolicy::None));
    let server = GatewayServer::from_parts(
        &config,
        Arc::new(portcullis_gateway::auth::NoAuthProvider),
        TelemetryChain::new(Vec::new()),
    )
    .await
    .unwrap()
    .with_grace_period(Duration::from_millis(200));
    let bound = server
        .bind_to("127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let addr = bound.local_addr().unwrap();

    let (trigger, signal) = tokio::sync::oneshot::channel::<()>();
    let serving = tokio::spawn(bound.serve(async move {
        let _ = signal.await;
    }));

    let request = tokio::spawn(async move {
        client().get(format!("http://{addr}/hang")).send().await
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    trigger.send(()).unwrap();

    let started = Instant::now();
    let outcome = serving.await.unwrap().unwrap();
    assert_eq!(outcome, ShutdownOutcome::TimedOut);
    // The process regains control shortly after the grace period, not after
    // the hung upstream.
    assert!(started.elapsed() < Duration::from_secs(5));

    request.abort();
}

// ─────────────────────────────────────────────────────────────────────────────
// Construction failures
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn telemetry_init_failure_is_fatal_before_binding() {
    struct BrokenProvider;

    #[async_trait]
    impl TelemetryProvider for BrokenProvider {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn init(&self) -> Result<(), portcullis_gateway::error::StartupError> {
            Err(portcullis_gateway::error::StartupError::ProviderInit {
                name: "broken",
                message: "collector unreachable".to_string(),
            })
        }

        fn instrument(&self, router: Router) -> Router {
            router
        }

        fn diagnostic_handler(&self) -> Option<MethodRouter> {
            None
        }
    }

    let config = GatewayConfig::new(8080);
    let result = GatewayServer::from_parts(
        &config,
        Arc::new(portcullis_gateway::auth::NoAuthProvider),
        TelemetryChain::new(vec![Arc::new(BrokenProvider)]),
    )
    .await;
    assert!(matches!(
        result,
        Err(portcullis_gateway::error::StartupError::ProviderInit { name: "broken", .. })
    ));
}

#[tokio::test]
async fn request_body_limit_is_not_imposed_by_the_gateway() {
    // A 1 MiB body streams through without buffering limits.
    let app = Router::new().fallback(|body: Bytes| async move { body.len().to_string() });
    let upstream = spawn_upstream(app).await;
    let config = GatewayConfig::new(8080).with_route(route_to(upstream, "/big", AuthPolicy::None));
    let base = start_gateway(
        &config,
        Arc::new(portcullis_gateway::auth::NoAuthProvider),
        TelemetryChain::new(Vec::new()),
    )
    .await;

    let payload = vec![0xa5u8; 1024 * 1024];
    let response = client()
        .post(format!("{base}/big"))
        .body(payload)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), (1024 * 1024).to_string());
}
