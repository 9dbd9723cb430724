/// Rate Limiting System
use crate::{
    api::middleware::extract_bearer_token,
    config::RateLimitSettings,
    context::AppContext,
    error::{PostError, PostResult},
};
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

/// Rate limiter manager
#[derive(Clone)]
pub struct RateLimiter {
    enabled: bool,
    authenticated: Arc<DirectLimiter>,
    unauthenticated: Arc<DirectLimiter>,
}

fn quota(rps: u32) -> Quota {
    let rate = NonZeroU32::new(rps).unwrap_or(NonZeroU32::MIN);
    // Allow a burst of one second's worth of requests
    Quota::per_second(rate).allow_burst(rate)
}

impl RateLimiter {
    pub fn new(settings: &RateLimitSettings) -> Self {
        Self {
            enabled: settings.enabled,
            authenticated: Arc::new(GovernorLimiter::direct(quota(settings.authenticated_rps))),
            unauthenticated: Arc::new(GovernorLimiter::direct(quota(
                settings.unauthenticated_rps,
            ))),
        }
    }

    fn check(&self, limiter: &DirectLimiter) -> PostResult<()> {
        if !self.enabled {
            return Ok(());
        }
        limiter.check().map_err(|_| PostError::RateLimitExceeded {
            retry_after: Duration::from_secs(1),
        })
    }

    /// Check rate limit for a request carrying a session token
    pub fn check_authenticated(&self) -> PostResult<()> {
        self.check(&self.authenticated)
    }

    /// Check rate limit for an anonymous request
    pub fn check_unauthenticated(&self) -> PostResult<()> {
        self.check(&self.unauthenticated)
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(ctx): State<AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, PostError> {
    if extract_bearer_token(request.headers()).is_some() {
        ctx.rate_limiter.check_authenticated()?;
    } else {
        ctx.rate_limiter.check_unauthenticated()?;
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(enabled: bool) -> RateLimitSettings {
        RateLimitSettings {
            enabled,
            authenticated_rps: 5,
            unauthenticated_rps: 2,
        }
    }

    #[test]
    fn test_rate_limiter_creation() {
        let limiter = RateLimiter::new(&settings(true));

        assert!(limiter.check_authenticated().is_ok());
        assert!(limiter.check_unauthenticated().is_ok());
    }

    #[test]
    fn test_burst_limit() {
        let limiter = RateLimiter::new(&settings(true));

        for _ in 0..5 {
            assert!(limiter.check_authenticated().is_ok());
        }
        assert!(matches!(
            limiter.check_authenticated(),
            Err(PostError::RateLimitExceeded { .. })
        ));
    }

    #[test]
    fn test_disabled_limiter_allows_everything() {
        let limiter = RateLimiter::new(&settings(false));

        for _ in 0..100 {
            assert!(limiter.check_unauthenticated().is_ok());
        }
    }

    #[test]
    fn test_zero_rate_allows_one_per_second() {
        let limiter = RateLimiter::new(&RateLimitSettings {
            enabled: true,
            authenticated_rps: 0,
            unauthenticated_rps: 0,
        });

        assert!(limiter.check_authenticated().is_ok());
        assert!(limiter.check_authenticated().is_err());
    }
}
