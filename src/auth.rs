/// Bearer token issuing and authentication extractors
use crate::{
    api::middleware::extract_bearer_token,
    context::AppContext,
    db::user::Role,
    error::{MarketError, MarketResult},
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by an access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies HS256 access tokens
#[derive(Clone)]
pub struct TokenAuthority {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenAuthority {
    pub fn new(secret: &str, ttl_days: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::days(ttl_days),
        }
    }

    /// Issue a token for a user
    pub fn issue(&self, user_id: &str, role: Role) -> MarketResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| MarketError::Internal(format!("Token signing failed: {}", e)))
    }

    /// Verify a token's signature and expiry
    pub fn verify(&self, token: &str) -> MarketResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Allow some clock skew (5 minutes)
        validation.leeway = 300;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Token verification failed: {}", e);
                MarketError::Authentication("Not authorized, token failed".to_string())
            })
    }
}

/// Authenticated requester
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Resolve a bearer token to a live user; the role comes from the stored record
async fn authenticate(token: &str, state: &AppContext) -> MarketResult<AuthUser> {
    let claims = state.tokens.verify(token)?;

    let user = state
        .accounts
        .find_by_id(&claims.sub)
        .await?
        .ok_or_else(|| MarketError::Authentication("User not found".to_string()))?;

    Ok(AuthUser {
        user_id: user.id,
        role: user.role,
    })
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthUser {
    type Rejection = MarketError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| MarketError::Authentication("Not authorized, no token".to_string()))?;

        authenticate(&token, state).await
    }
}

/// Optional authentication - does not fail if no valid token is provided
#[derive(Debug, Clone)]
pub struct OptionalAuthUser(pub Option<AuthUser>);

#[async_trait]
impl FromRequestParts<AppContext> for OptionalAuthUser {
    type Rejection = MarketError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = extract_bearer_token(&parts.headers) else {
            return Ok(OptionalAuthUser(None));
        };

        match authenticate(&token, state).await {
            Ok(user) => Ok(OptionalAuthUser(Some(user))),
            Err(MarketError::Authentication(_)) => Ok(OptionalAuthUser(None)),
            Err(e) => Err(e),
        }
    }
}

/// Authenticated requester holding the admin role
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

#[async_trait]
impl FromRequestParts<AppContext> for AdminUser {
    type Rejection = MarketError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            tracing::warn!("User {} attempted an admin action", user.user_id);
            return Err(MarketError::Forbidden(
                "Not authorized as an admin".to_string(),
            ));
        }

        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-that-is-long-enough-for-hs256";

    #[test]
    fn test_issue_and_verify() {
        let authority = TokenAuthority::new(SECRET, 1);
        let token = authority.issue("user-1", Role::Admin).unwrap();

        let claims = authority.verify(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = TokenAuthority::new(SECRET, 1)
            .issue("user-1", Role::User)
            .unwrap();

        let other = TokenAuthority::new("another-secret-that-is-also-long-enough", 1);
        assert!(matches!(
            other.verify(&token),
            Err(MarketError::Authentication(_))
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let authority = TokenAuthority::new(SECRET, -1);
        let token = authority.issue("user-1", Role::User).unwrap();
        assert!(authority.verify(&token).is_err());
    }
}
