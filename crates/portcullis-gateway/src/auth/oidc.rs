//! OIDC token verification: JWKS fetching/caching and JWT validation.
//!
//! The OIDC-backed providers delegate the cryptographic part of
//! authentication here. The verifier resolves the signing key for a token's
//! `kid` from the issuer's JWKS document — fetched lazily and cached for a
//! refresh interval — then checks signature, issuer, audience, and expiry.
//!
//! Construction performs no I/O: an unreachable identity service shows up
//! per-request as [`AuthError::ProviderUnavailable`], never as a startup
//! failure.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{debug, warn};

use portcullis_kernel::{AuthContext, AuthError};

const JWKS_REFRESH_INTERVAL: Duration = Duration::from_secs(300);
const JWKS_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

// ─────────────────────────────────────────────────────────────────────────────
// JWKS document
// ─────────────────────────────────────────────────────────────────────────────

/// JWKS document published by the issuer.
#[derive(Debug, Deserialize)]
struct JwksDocument {
    keys: Vec<Jwk>,
}

/// A single JSON Web Key. The supported issuers sign with RSA; anything
/// else in the document is skipped.
#[derive(Debug, Deserialize)]
struct Jwk {
    kty: String,
    kid: Option<String>,
    n: Option<String>,
    e: Option<String>,
}

struct CachedKeys {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Option<Instant>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Claims
// ─────────────────────────────────────────────────────────────────────────────

/// Claims common to the supported OIDC issuers.
#[derive(Debug, Deserialize)]
pub struct OidcClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Role claim, where the issuer provides one.
    #[serde(default)]
    pub roles: Option<Vec<String>>,
}

impl OidcClaims {
    /// Build the request identity from validated claims.
    ///
    /// `default_role` fills in when the issuer carries no role claim, so a
    /// context always has at least one role.
    pub fn into_context(self, default_role: &str, token: &str) -> AuthContext {
        AuthContext {
            user_id: self.sub,
            email: self.email,
            roles: self
                .roles
                .unwrap_or_else(|| vec![default_role.to_string()]),
            token: Some(token.to_string()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// OidcVerifier
// ─────────────────────────────────────────────────────────────────────────────

/// Issuer-pinned token verifier shared by the OIDC-backed providers.
pub struct OidcVerifier {
    issuer: String,
    audience: String,
    jwks_url: String,
    client: reqwest::Client,
    cache: RwLock<CachedKeys>,
}

impl OidcVerifier {
    pub fn new(
        issuer: impl Into<String>,
        audience: impl Into<String>,
        jwks_url: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(JWKS_FETCH_TIMEOUT)
            .build()
            .expect("failed to build JWKS HTTP client");

        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            jwks_url: jwks_url.into(),
            client,
            cache: RwLock::new(CachedKeys {
                keys: HashMap::new(),
                fetched_at: None,
            }),
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Verify `token` and return its claims.
    pub async fn verify(&self, token: &str) -> Result<OidcClaims, AuthError> {
        let header =
            decode_header(token).map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| AuthError::InvalidToken("token header has no key id".to_string()))?;

        let key = self.key_for(&kid).await?;

        // The algorithm is pinned rather than taken from the token header:
        // a header-selected algorithm would let a caller downgrade
        // verification.
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);

        let data = decode::<OidcClaims>(token, &key, &validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        Ok(data.claims)
    }

    /// Resolve a decoding key by id, refreshing the JWKS cache when stale
    /// or when the id is unknown (covers key rotation).
    async fn key_for(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        {
            let cache = self.cache.read();
            let fresh = cache
                .fetched_at
                .is_some_and(|at| at.elapsed() < JWKS_REFRESH_INTERVAL);
            if fresh {
                if let Some(key) = cache.keys.get(kid) {
                    return Ok(key.clone());
                }
            }
        }

        self.refresh().await?;

        let cache = self.cache.read();
        cache
            .keys
            .get(kid)
            .cloned()
            .ok_or_else(|| AuthError::InvalidToken(format!("no signing key for kid '{kid}'")))
    }

    async fn refresh(&self) -> Result<(), AuthError> {
        debug!(url = %self.jwks_url, "fetching JWKS");

        let document: JwksDocument = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| AuthError::ProviderUnavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| AuthError::ProviderUnavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::ProviderUnavailable(e.to_string()))?;

        let mut keys = HashMap::new();
        for jwk in &document.keys {
            match parse_key(jwk) {
                Some((kid, key)) => {
                    keys.insert(kid, key);
                }
                None => {
                    warn!(kty = %jwk.kty, kid = ?jwk.kid, "skipping unsupported JWKS key");
                }
            }
        }
        debug!(count = keys.len(), "cached JWKS keys");

        let mut cache = self.cache.write();
        cache.keys = keys;
        cache.fetched_at = Some(Instant::now());
        Ok(())
    }
}

/// Parse one JWK into a usable decoding key, or `None` if it is not an RSA
/// signing key.
fn parse_key(jwk: &Jwk) -> Option<(String, DecodingKey)> {
    if jwk.kty != "RSA" {
        return None;
    }
    let kid = jwk.kid.clone()?;
    let n = jwk.n.as_deref()?;
    let e = jwk.e.as_deref()?;
    match DecodingKey::from_rsa_components(n, e) {
        Ok(key) => Some((kid, key)),
        Err(_) => None,
    }
}

// =============================================================================
// Tests
// =============================================================================
