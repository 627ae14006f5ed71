//! `portcullis-kernel` — contract types for the Portcullis gateway.
//!
//! This crate defines the *configuration model and trait interfaces* the
//! gateway runtime is built against. No axum, no sockets, no crypto — those
//! belong in `portcullis-gateway`.
//!
//! # Architecture mapping
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │            portcullis-kernel  (this crate)                  │
//! │  GatewayConfig + loader + env overrides + validate()        │
//! │  AuthProvider trait    AuthContext / AuthPolicy             │
//! │  ConfigError                                                │
//! └──────────────────────────┬──────────────────────────────────┘
//!                            │  depends on
//! ┌──────────────────────────▼──────────────────────────────────┐
//! │            portcullis-gateway  (runtime crate)              │
//! │  NoAuth / Azure / Google / Okta: impl AuthProvider          │
//! │  TelemetryProvider chain (noop/prometheus/otel/…)           │
//! │  UpstreamForwarder  (reqwest streaming proxy)               │
//! │  GatewayServer  (axum HTTP server + lifecycle)              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick start
//!
//! ```rust
//! use portcullis_kernel::{AuthPolicy, GatewayConfig, RouteConfig};
//!
//! let config = GatewayConfig::new(8080)
//!     .with_route(
//!         RouteConfig::new("/api/orders", "http://orders.internal:9000")
//!             .with_policy(AuthPolicy::Required),
//!     );
//!
//! config.validate().expect("gateway config is valid");
//! ```

pub mod auth;
pub mod config;
pub mod error;
mod validation;

// ── Flat re-exports ────────────────────────────────────────────────────────

pub use auth::{AuthContext, AuthError, AuthPolicy, AuthProvider};
pub use config::{
    GatewayConfig, RouteConfig, ServerConfig, SsoConfig, SsoKind, TelemetryConfig, TelemetryKind,
};
pub use error::ConfigError;
