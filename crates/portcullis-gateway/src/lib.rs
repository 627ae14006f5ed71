//! `portcullis-gateway` — the Portcullis reverse-proxy gateway runtime.
//!
//! This crate provides the concrete implementations of the contracts defined
//! in `portcullis-kernel`:
//!
//! | Kernel contract | Implementation |
//! |-----------------|----------------|
//! | [`AuthProvider`](portcullis_kernel::AuthProvider) | [`auth::NoAuthProvider`], [`auth::AzureProvider`], [`auth::GoogleProvider`], [`auth::OktaProvider`] |
//! | per-route policy | [`auth::enforce_policy`] middleware |
//! | telemetry chain | [`telemetry::TelemetryChain`] over [`telemetry::TelemetryProvider`] |
//! | upstream delivery | [`proxy::UpstreamForwarder`] |
//!
//! [`server::GatewayServer`] wires everything together into an axum HTTP
//! service with a `Constructing → Ready → Serving → Draining → Stopped`
//! lifecycle.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use portcullis_gateway::server::GatewayServer;
//! use portcullis_kernel::{AuthPolicy, GatewayConfig, RouteConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = GatewayConfig::new(8080).with_route(
//!         RouteConfig::new("/api/orders", "http://orders.internal:9000")
//!             .with_policy(AuthPolicy::Required),
//!     );
//!
//!     let server = GatewayServer::from_config(&config).await.unwrap();
//!     let bound = server.bind().await.unwrap();
//!     bound.serve(std::future::pending()).await.unwrap();
//! }
//! ```

pub mod auth;
pub mod error;
pub mod proxy;
pub mod server;
pub mod telemetry;
