//! Structural validation of [`GatewayConfig`].
//!
//! All invariants are checked *before* any runtime resource is allocated;
//! the gateway never opens a listener over a configuration that can fail
//! later for a reason visible here. Returns the *first* detected error.

use std::collections::HashSet;

use url::Url;

use crate::config::{GatewayConfig, SsoConfig, SsoKind, TelemetryConfig, TelemetryKind};
use crate::error::ConfigError;

/// Paths the gateway serves itself; routes may not shadow them.
const RESERVED_PATHS: [&str; 1] = ["/health"];

impl GatewayConfig {
    /// Validate all structural invariants of this configuration.
    ///
    /// Checks performed (in order):
    /// 1. `server.port` is set.
    /// 2. Every route has a non-empty, rooted, unique, non-reserved path.
    /// 3. Every route has an upstream that parses as an http(s) URL.
    /// 4. The enabled SSO kind has its required fields.
    /// 5. Every enabled telemetry entry has its required fields.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // ── 1. Port ──────────────────────────────────────────────────────────
        if self.server.port == 0 {
            return Err(ConfigError::MissingPort);
        }

        // ── 2 + 3. Routes ────────────────────────────────────────────────────
        let mut seen: HashSet<&str> = HashSet::new();
        for route in &self.routes {
            if route.path.trim().is_empty() {
                return Err(ConfigError::EmptyRoutePath);
            }
            if !route.path.starts_with('/') {
                return Err(ConfigError::InvalidRoutePath(
                    route.path.clone(),
                    "path must start with '/'".to_string(),
                ));
            }
            if RESERVED_PATHS.contains(&route.path.as_str()) {
                return Err(ConfigError::ReservedRoutePath(route.path.clone()));
            }
            if !seen.insert(route.path.as_str()) {
                return Err(ConfigError::DuplicateRoute(route.path.clone()));
            }

            if route.upstream.trim().is_empty() {
                return Err(ConfigError::MissingUpstream(route.path.clone()));
            }
            match Url::parse(&route.upstream) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                Ok(url) => {
                    return Err(ConfigError::InvalidUpstream(
                        route.path.clone(),
                        format!("unsupported scheme '{}'", url.scheme()),
                    ));
                }
                Err(err) => {
                    return Err(ConfigError::InvalidUpstream(
                        route.path.clone(),
                        err.to_string(),
                    ));
                }
            }
        }

        // ── 4. SSO fields ────────────────────────────────────────────────────
        validate_sso(&self.sso)?;

        // ── 5. Telemetry fields ──────────────────────────────────────────────
        for entry in &self.telemetry {
            validate_telemetry(entry)?;
        }

        Ok(())
    }
}

fn validate_sso(sso: &SsoConfig) -> Result<(), ConfigError> {
    if !sso.enabled {
        return Ok(());
    }
    match sso.kind {
        SsoKind::None => Ok(()),
        SsoKind::Azure => {
            if sso.client_id.trim().is_empty() {
                return Err(ConfigError::MissingSsoField("clientId"));
            }
            if sso.tenant_id.trim().is_empty() {
                return Err(ConfigError::MissingSsoField("tenantId"));
            }
            Ok(())
        }
        SsoKind::Google => {
            if sso.client_id.trim().is_empty() {
                return Err(ConfigError::MissingSsoField("clientId"));
            }
            Ok(())
        }
        SsoKind::Okta => {
            if sso.client_id.trim().is_empty() {
                return Err(ConfigError::MissingSsoField("clientId"));
            }
            if sso.issuer_url.trim().is_empty() && sso.tenant_id.trim().is_empty() {
                return Err(ConfigError::MissingSsoField("issuerUrl or tenantId"));
            }
            if sso.redirect_url.trim().is_empty() {
                return Err(ConfigError::MissingSsoField("redirectUrl"));
            }
            Ok(())
        }
    }
}

fn validate_telemetry(entry: &TelemetryConfig) -> Result<(), ConfigError> {
    if !entry.enabled {
        return Ok(());
    }
    match entry.kind {
        TelemetryKind::Opentelemetry if entry.endpoint.trim().is_empty() => {
            Err(ConfigError::MissingTelemetryField {
                name: "opentelemetry",
                field: "endpoint",
            })
        }
        TelemetryKind::Newrelic if entry.api_key.trim().is_empty() => {
            Err(ConfigError::MissingTelemetryField {
                name: "newrelic",
                field: "apiKey",
            })
        }
        TelemetryKind::Prometheus
            if !entry.prom_path.is_empty() && !entry.prom_path.starts_with('/') =>
        {
            Err(ConfigError::InvalidPromPath(entry.prom_path.clone()))
        }
        _ => Ok(()),
    }
}

// =============================================================================
// Tests
// =============================================================================
