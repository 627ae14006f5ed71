//! Google SSO provider.

use async_trait::async_trait;

use portcullis_kernel::{AuthContext, AuthError, AuthProvider, ConfigError, SsoConfig};

use super::oidc::OidcVerifier;

const GOOGLE_ISSUER: &str = "https://accounts.google.com";
const GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";

/// Verifies Google ID tokens. The issuer is fixed; only the OAuth client id
/// varies per deployment.
pub struct GoogleProvider {
    verifier: OidcVerifier,
}

impl GoogleProvider {
    /// Required field: `clientId`.
    pub fn new(sso: &SsoConfig) -> Result<Self, ConfigError> {
        if sso.client_id.trim().is_empty() {
            return Err(ConfigError::MissingSsoField("clientId"));
        }
        Ok(Self {
            verifier: OidcVerifier::new(GOOGLE_ISSUER, sso.client_id.clone(), GOOGLE_JWKS_URL),
        })
    }
}

#[async_trait]
impl AuthProvider for GoogleProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    fn login_url(&self) -> String {
        "https://accounts.google.com/o/oauth2/v2/auth".to_string()
    }

    async fn authenticate(&self, token: &str) -> Result<AuthContext, AuthError> {
        let claims = self.verifier.verify(token).await?;
        Ok(claims.into_context("google-user", token))
    }
}
