//! Configuration model for the gateway.
//!
//! The model is deserialized from a YAML file, environment overrides are
//! applied on top, and [`GatewayConfig::validate`] checks every structural
//! invariant *before* any runtime resource is allocated. The runtime crate
//! only ever consumes a validated config.
//!
//! Field names follow the camelCase convention of the config file
//! (`tlsEnabled`, `clientId`, `authPolicy`, …).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::auth::AuthPolicy;
use crate::error::ConfigError;

// ─────────────────────────────────────────────────────────────────────────────
// Server
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    /// TCP port to listen on. Must be set, by file or `GATEWAY_PORT`.
    pub port: u16,
    /// Whether clients reach this gateway over TLS. Only drives the
    /// `X-Forwarded-Proto` header — certificate loading and termination are
    /// the deployment's concern.
    pub tls_enabled: bool,
    /// Grace period for in-flight requests during shutdown, in seconds.
    pub shutdown_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 0,
            tls_enabled: false,
            shutdown_grace_secs: 15,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SSO
// ─────────────────────────────────────────────────────────────────────────────

/// Supported single-sign-on backends.
///
/// A closed enum: an unrecognised kind string fails deserialization — it can
/// never silently resolve to a different variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SsoKind {
    #[default]
    None,
    Azure,
    Google,
    Okta,
}

impl SsoKind {
    /// Case-insensitive parse, used by the environment overrides.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(SsoKind::None),
            "azure" => Some(SsoKind::Azure),
            "google" => Some(SsoKind::Google),
            "okta" => Some(SsoKind::Okta),
            _ => None,
        }
    }
}

/// Single-sign-on settings.
///
/// Which fields are required depends on the enabled kind — see
/// [`GatewayConfig::validate`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SsoConfig {
    pub enabled: bool,
    #[serde(rename = "type")]
    pub kind: SsoKind,
    pub client_id: String,
    pub client_secret: String,
    pub tenant_id: String,
    pub issuer_url: String,
    pub redirect_url: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Telemetry
// ─────────────────────────────────────────────────────────────────────────────

/// Supported observability backends. Closed enum, like [`SsoKind`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TelemetryKind {
    #[default]
    None,
    Prometheus,
    Opentelemetry,
    Newrelic,
    Appdynamics,
}

impl TelemetryKind {
    /// Case-insensitive parse, used by the environment overrides.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(TelemetryKind::None),
            "prometheus" => Some(TelemetryKind::Prometheus),
            "opentelemetry" => Some(TelemetryKind::Opentelemetry),
            "newrelic" => Some(TelemetryKind::Newrelic),
            "appdynamics" => Some(TelemetryKind::Appdynamics),
            _ => None,
        }
    }
}

/// One entry of the telemetry provider chain. Chain order in the file is
/// chain order at runtime — it is fixed at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TelemetryConfig {
    pub enabled: bool,
    #[serde(rename = "type")]
    pub kind: TelemetryKind,
    /// Collector endpoint (required for `opentelemetry`).
    pub endpoint: String,
    /// Vendor credential (required for `newrelic`).
    pub api_key: String,
    /// Path for the Prometheus exposition endpoint. Defaults to the
    /// provider name when empty.
    pub prom_path: String,
    /// Service name reported to the backend.
    pub service: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Routes
// ─────────────────────────────────────────────────────────────────────────────

/// A single routing rule mapping an exact path to an upstream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RouteConfig {
    /// Exact request path this route serves. Must begin with `/`.
    pub path: String,
    /// Base URL of the upstream service, e.g. `http://orders.internal:9000`.
    pub upstream: String,
    /// Scopes associated with the route. Carried for operators; not
    /// enforced by the gateway.
    pub scopes: Vec<String>,
    /// Authentication policy for this route. Defaults to `optional`.
    pub auth_policy: AuthPolicy,
}

impl RouteConfig {
    /// Create a route with the default (`optional`) policy.
    pub fn new(path: impl Into<String>, upstream: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            upstream: upstream.into(),
            scopes: Vec::new(),
            auth_policy: AuthPolicy::default(),
        }
    }

    /// Builder: set the authentication policy.
    pub fn with_policy(mut self, policy: AuthPolicy) -> Self {
        self.auth_policy = policy;
        self
    }

    /// Builder: set the scope list.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// GatewayConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub sso: SsoConfig,
    pub telemetry: Vec<TelemetryConfig>,
    pub routes: Vec<RouteConfig>,
}

impl GatewayConfig {
    /// Construct a minimal config listening on `port`.
    pub fn new(port: u16) -> Self {
        Self {
            server: ServerConfig {
                port,
                ..ServerConfig::default()
            },
            ..Self::default()
        }
    }

    /// Builder: add a route.
    pub fn with_route(mut self, route: RouteConfig) -> Self {
        self.routes.push(route);
        self
    }

    /// Builder: set the SSO block.
    pub fn with_sso(mut self, sso: SsoConfig) -> Self {
        self.sso = sso;
        self
    }

    /// Builder: append a telemetry chain entry.
    pub fn with_telemetry(mut self, telemetry: TelemetryConfig) -> Self {
        self.telemetry.push(telemetry);
        self
    }

    /// Load a config file: parse YAML, apply environment overrides, then
    /// validate. The returned config is ready for the runtime.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let mut cfg: Self =
            serde_yaml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply environment overrides on top of file values.
    ///
    /// Overrides take precedence and run *before* validation, so an
    /// override can both fix and break a config — validation has the last
    /// word either way. An override that is present but unparseable is an
    /// error, not a silent fallback to the file value.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(port) = env_var("GATEWAY_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| ConfigError::Parse(format!("GATEWAY_PORT: '{port}' is not a port")))?;
        }
        if let Some(flag) = env_var("GATEWAY_TLS_ENABLED") {
            self.server.tls_enabled = parse_bool("GATEWAY_TLS_ENABLED", &flag)?;
        }

        if let Some(flag) = env_var("SSO_ENABLED") {
            self.sso.enabled = parse_bool("SSO_ENABLED", &flag)?;
        }
        if let Some(kind) = env_var("SSO_TYPE") {
            self.sso.kind = SsoKind::parse(&kind)
                .ok_or_else(|| ConfigError::Parse(format!("SSO_TYPE: unknown kind '{kind}'")))?;
        }
        if let Some(v) = env_var("SSO_CLIENT_ID") {
            self.sso.client_id = v;
        }
        if let Some(v) = env_var("SSO_CLIENT_SECRET") {
            self.sso.client_secret = v;
        }
        if let Some(v) = env_var("SSO_TENANT_ID") {
            self.sso.tenant_id = v;
        }
        if let Some(v) = env_var("SSO_ISSUER_URL") {
            self.sso.issuer_url = v;
        }
        if let Some(v) = env_var("SSO_REDIRECT_URL") {
            self.sso.redirect_url = v;
        }

        for (i, entry) in self.telemetry.iter_mut().enumerate() {
            if let Some(flag) = env_var(&format!("TELEMETRY_{i}_ENABLED")) {
                entry.enabled = parse_bool("TELEMETRY_*_ENABLED", &flag)?;
            }
            if let Some(kind) = env_var(&format!("TELEMETRY_{i}_TYPE")) {
                entry.kind = TelemetryKind::parse(&kind).ok_or_else(|| {
                    ConfigError::Parse(format!("TELEMETRY_{i}_TYPE: unknown kind '{kind}'"))
                })?;
            }
            if let Some(v) = env_var(&format!("TELEMETRY_{i}_ENDPOINT")) {
                entry.endpoint = v;
            }
            if let Some(v) = env_var(&format!("TELEMETRY_{i}_API_KEY")) {
                entry.api_key = v;
            }
            if let Some(v) = env_var(&format!("TELEMETRY_{i}_PROM_PATH")) {
                entry.prom_path = v;
            }
            if let Some(v) = env_var(&format!("TELEMETRY_{i}_SERVICE")) {
                entry.service = v;
            }
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(ConfigError::Parse(format!(
            "{name}: '{other}' is not a boolean"
        ))),
    }
}

// =============================================================================
// Tests
// =============================================================================
