/// Google ID token verification
use crate::error::{MarketError, MarketResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// Identity asserted by an external provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    pub email: String,
    pub name: String,
    pub picture: String,
}

/// Verifies third-party ID tokens
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> MarketResult<ExternalIdentity>;
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: Option<String>,
    email: Option<String>,
    email_verified: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

/// Verifier backed by Google's tokeninfo endpoint
pub struct GoogleTokenInfo {
    client: reqwest::Client,
    client_id: Option<String>,
}

impl GoogleTokenInfo {
    pub fn new(client_id: Option<String>) -> MarketResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| MarketError::Internal(format!("HTTP client creation failed: {}", e)))?;

        Ok(Self { client, client_id })
    }
}

#[async_trait]
impl IdentityVerifier for GoogleTokenInfo {
    async fn verify(&self, id_token: &str) -> MarketResult<ExternalIdentity> {
        let Some(expected_aud) = self.client_id.as_deref() else {
            return Err(MarketError::UpstreamUnavailable(
                "Google sign-in is not configured".to_string(),
            ));
        };

        let response = self
            .client
            .get(TOKENINFO_URL)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Google tokeninfo request failed: {}", e);
                MarketError::UpstreamUnavailable("Google verification unavailable".to_string())
            })?;

        if !response.status().is_success() {
            return Err(MarketError::Authentication(
                "Invalid Google token".to_string(),
            ));
        }

        let info: TokenInfo = response.json().await.map_err(|e| {
            tracing::warn!("Unexpected tokeninfo response: {}", e);
            MarketError::UpstreamUnavailable("Google verification unavailable".to_string())
        })?;

        if info.aud.as_deref() != Some(expected_aud) {
            return Err(MarketError::Authentication(
                "Google token was issued for another client".to_string(),
            ));
        }

        if info.email_verified.as_deref() != Some("true") {
            return Err(MarketError::Authentication(
                "Google email is not verified".to_string(),
            ));
        }

        let email = info
            .email
            .ok_or_else(|| MarketError::Authentication("Google token has no email".to_string()))?;

        Ok(ExternalIdentity {
            name: info.name.unwrap_or_default(),
            picture: info.picture.unwrap_or_default(),
            email,
        })
    }
}
