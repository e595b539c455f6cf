/// Rate limiting per caller class
use crate::config::RateLimitSettings;
use crate::error::{MarketError, MarketResult};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorLimiter,
};
use std::{num::NonZeroU32, sync::Arc, time::Duration};

type DirectLimiter = GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Caller class a request is throttled under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerClass {
    Anonymous,
    Authenticated,
    Admin,
}

/// Rate limiter manager
#[derive(Clone)]
pub struct RateLimiter {
    enabled: bool,
    anonymous: Arc<DirectLimiter>,
    authenticated: Arc<DirectLimiter>,
    admin: Arc<DirectLimiter>,
}

fn quota(rps: u32, burst: u32) -> Quota {
    Quota::per_second(NonZeroU32::new(rps).unwrap_or(NonZeroU32::MIN))
        .allow_burst(NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN))
}

impl RateLimiter {
    pub fn new(settings: &RateLimitSettings) -> Self {
        Self {
            enabled: settings.enabled,
            anonymous: Arc::new(GovernorLimiter::direct(quota(
                settings.anonymous_rps,
                settings.burst_size / 5,
            ))),
            authenticated: Arc::new(GovernorLimiter::direct(quota(
                settings.authenticated_rps,
                settings.burst_size,
            ))),
            admin: Arc::new(GovernorLimiter::direct(quota(
                settings.admin_rps,
                settings.burst_size.saturating_mul(2),
            ))),
        }
    }

    /// Check the limiter for a caller class
    pub fn check(&self, class: CallerClass) -> MarketResult<()> {
        if !self.enabled {
            return Ok(());
        }

        let limiter = match class {
            CallerClass::Anonymous => &self.anonymous,
            CallerClass::Authenticated => &self.authenticated,
            CallerClass::Admin => &self.admin,
        };

        limiter
            .check()
            .map_err(|_| MarketError::RateLimitExceeded {
                retry_after: Duration::from_secs(1),
            })
    }
}

/// Classify a request by path and Authorization header
pub fn classify(path: &str, has_auth_header: bool) -> CallerClass {
    if has_auth_header && path.starts_with("/api/admin") {
        CallerClass::Admin
    } else if has_auth_header {
        CallerClass::Authenticated
    } else {
        CallerClass::Anonymous
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(ctx): State<crate::context::AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, MarketError> {
    let class = classify(
        request.uri().path(),
        request.headers().contains_key("authorization"),
    );

    ctx.rate_limiter.check(class)?;

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(enabled: bool) -> RateLimitSettings {
        RateLimitSettings {
            enabled,
            anonymous_rps: 5,
            authenticated_rps: 10,
            admin_rps: 100,
            burst_size: 5,
        }
    }

    #[test]
    fn test_burst_limit() {
        let limiter = RateLimiter::new(&settings(true));

        for _ in 0..5 {
            assert!(limiter.check(CallerClass::Authenticated).is_ok());
        }

        assert!(matches!(
            limiter.check(CallerClass::Authenticated),
            Err(MarketError::RateLimitExceeded { .. })
        ));
        assert!(limiter.check(CallerClass::Admin).is_ok());
    }

    #[test]
    fn test_disabled_limiter_allows_everything() {
        let limiter = RateLimiter::new(&settings(false));
        for _ in 0..100 {
            assert!(limiter.check(CallerClass::Anonymous).is_ok());
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("/api/tools", false), CallerClass::Anonymous);
        assert_eq!(classify("/api/tools", true), CallerClass::Authenticated);
        assert_eq!(classify("/api/admin/stats", true), CallerClass::Admin);
        assert_eq!(classify("/api/admin/stats", false), CallerClass::Anonymous);
    }
}
