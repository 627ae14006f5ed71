//! Reverse-proxy forwarding.
//!
//! [`UpstreamForwarder`] rewrites an inbound request for a route's upstream
//! and streams the exchange in both directions through one shared pooled
//! client, so a slow upstream ties up its own connections rather than the
//! gateway's. Failures are translated to a generic Bad-Gateway: the caller
//! never sees upstream addresses or error detail.

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request};
use axum::http::{HeaderMap, HeaderName, HeaderValue, header};
use axum::response::Response;
use tracing::{error, info};
use url::Url;
use uuid::Uuid;

use portcullis_kernel::AuthContext;

use crate::error::{ApiError, StartupError};

/// Connection-scoped headers a proxy must not forward.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
const POOL_MAX_IDLE_PER_HOST: usize = 100;

/// Streams requests to upstreams over a bounded keep-alive pool.
pub struct UpstreamForwarder {
    client: reqwest::Client,
    proto: &'static str,
}

impl UpstreamForwarder {
    /// Build the shared upstream client. `tls_enabled` describes how
    /// clients reach *this* gateway and drives `X-Forwarded-Proto`.
    pub fn new(tls_enabled: bool) -> Result<Self, StartupError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            // A proxy relays redirects verbatim; following them here would
            // change what the caller observes.
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| StartupError::Client(e.to_string()))?;

        Ok(Self {
            client,
            proto: if tls_enabled { "https" } else { "http" },
        })
    }

    /// Forward `request` to `upstream`, streaming both bodies.
    ///
    /// Dropping the returned future (client disconnect) drops the in-flight
    /// upstream call with it.
    pub async fn forward(&self, upstream: &Url, request: Request) -> Result<Response, ApiError> {
        let request_id = Uuid::new_v4();
        let (parts, body) = request.into_parts();

        let target = target_url(upstream, parts.uri.path(), parts.uri.query());
        let context = parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .unwrap_or_else(AuthContext::anonymous);

        info!(
            request_id = %request_id,
            method = %parts.method,
            path = %parts.uri.path(),
            upstream = %upstream,
            user = %context.user_id,
            "proxying request"
        );

        let headers = forward_headers(
            &parts.headers,
            self.proto,
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0.ip().to_string()),
            &context.user_id,
        );

        let upstream_response = self
            .client
            .request(parts.method, target)
            .headers(headers)
            .body(reqwest::Body::wrap_stream(body.into_data_stream()))
            .send()
            .await
            .map_err(|err| {
                error!(request_id = %request_id, error = %err, "upstream request failed");
                ApiError::BadGateway
            })?;

        let status = upstream_response.status();
        info!(request_id = %request_id, status = status.as_u16(), "upstream responded");

        let mut builder = axum::http::Response::builder().status(status);
        for (name, value) in upstream_response.headers() {
            if is_hop_by_hop(name) {
                continue;
            }
            builder = builder.header(name, value);
        }
        Ok(builder
            .body(Body::from_stream(upstream_response.bytes_stream()))
            .unwrap())
    }
}

/// Join the upstream base with the inbound relative path and query.
///
/// The upstream's own path, if any, becomes a prefix:
/// `http://svc:1/base` + `/x?q=1` → `http://svc:1/base/x?q=1`.
fn target_url(upstream: &Url, path: &str, query: Option<&str>) -> Url {
    let mut target = upstream.clone();
    let base = upstream.path().trim_end_matches('/');
    target.set_path(&format!("{base}{path}"));
    target.set_query(query);
    target
}

/// Rewrite the inbound headers for the upstream: strip hop-by-hop headers
/// and the inbound host, then add the forwarding set.
fn forward_headers(
    inbound: &HeaderMap,
    proto: &'static str,
    peer_ip: Option<String>,
    user_id: &str,
) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in inbound {
        if is_hop_by_hop(name) || name == header::HOST || name == header::CONTENT_LENGTH {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    // The upstream sees its own host in `Host` (the client sets it); the
    // original is preserved in X-Forwarded-Host.
    if let Some(host) = inbound.get(header::HOST) {
        headers.insert(HeaderName::from_static("x-forwarded-host"), host.clone());
    }
    headers.insert(
        HeaderName::from_static("x-forwarded-proto"),
        HeaderValue::from_static(proto),
    );
    if let Some(peer) = peer_ip {
        let forwarded = match headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
        {
            Some(existing) => format!("{existing}, {peer}"),
            None => peer,
        };
        if let Ok(value) = HeaderValue::from_str(&forwarded) {
            headers.insert(HeaderName::from_static("x-forwarded-for"), value);
        }
    }
    if let Ok(value) = HeaderValue::from_str(user_id) {
        headers.insert(HeaderName::from_static("x-forwarded-user"), value);
    }

    headers
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

// =============================================================================
// Tests
// =============================================================================
