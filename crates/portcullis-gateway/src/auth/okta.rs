//! Okta SSO provider.

use async_trait::async_trait;
use url::Url;

use portcullis_kernel::{AuthContext, AuthError, AuthProvider, ConfigError, SsoConfig};

use super::oidc::OidcVerifier;

/// Verifies Okta ID tokens against the org's authorization server.
pub struct OktaProvider {
    verifier: OidcVerifier,
    login_url: String,
}

impl OktaProvider {
    /// Required fields: `clientId`, `redirectUrl`, and one of `issuerUrl` /
    /// `tenantId` (the issuer is derived from the tenant's default
    /// authorization server when only the tenant is given).
    pub fn new(sso: &SsoConfig) -> Result<Self, ConfigError> {
        if sso.client_id.trim().is_empty() {
            return Err(ConfigError::MissingSsoField("clientId"));
        }
        if sso.issuer_url.trim().is_empty() && sso.tenant_id.trim().is_empty() {
            return Err(ConfigError::MissingSsoField("issuerUrl or tenantId"));
        }
        if sso.redirect_url.trim().is_empty() {
            return Err(ConfigError::MissingSsoField("redirectUrl"));
        }

        let issuer = if sso.issuer_url.trim().is_empty() {
            format!("https://{}.okta.com/oauth2/default", sso.tenant_id)
        } else {
            sso.issuer_url.trim_end_matches('/').to_string()
        };
        let jwks_url = format!("{issuer}/v1/keys");
        let login_url = build_login_url(&issuer, &sso.client_id, &sso.redirect_url)?;

        Ok(Self {
            verifier: OidcVerifier::new(issuer, sso.client_id.clone(), jwks_url),
            login_url,
        })
    }
}

/// Authorization-code URL for the org's `/v1/authorize` endpoint.
fn build_login_url(issuer: &str, client_id: &str, redirect_url: &str) -> Result<String, ConfigError> {
    let mut url = Url::parse(&format!("{issuer}/v1/authorize"))
        .map_err(|e| ConfigError::InvalidSsoField("issuerUrl", e.to_string()))?;
    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_url)
        .append_pair("response_type", "code")
        .append_pair("scope", "openid profile email")
        .append_pair("state", "state-token")
        .append_pair("access_type", "offline");
    Ok(url.into())
}

#[async_trait]
impl AuthProvider for OktaProvider {
    fn name(&self) -> &'static str {
        "okta"
    }

    fn login_url(&self) -> String {
        self.login_url.clone()
    }

    async fn authenticate(&self, token: &str) -> Result<AuthContext, AuthError> {
        let claims = self.verifier.verify(token).await?;
        Ok(claims.into_context("okta-user", token))
    }
}
