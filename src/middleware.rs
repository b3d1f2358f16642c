//! # Rate-Limiting Middleware
//!
//! Assembles the rule/backend/authenticator pieces into the per-request
//! decision flow: match path pattern, authenticate, select rule by group,
//! consult the backend, and either forward or emit a `429` with an
//! optional `Retry-After` header. Patterned after the teacher's own
//! builder-configured middleware functions, but made fallible at
//! construction time instead of panicking.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::{debug, instrument, warn};

use crate::auth::Authenticator;
use crate::backend::Backend;
use crate::error::{AuthError, RateWallError};
use crate::request::HttpRequest;
use crate::response::HttpResponse;
use crate::rule::Rule;

/// How the `Retry-After` header value is formatted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAfterType {
    /// The integer number of seconds to wait, e.g. `"5"`.
    DelaySeconds,
    /// A UTC date string, e.g. `"Wed, 21 Oct 2026 07:28:00 UTC"`.
    HttpDate,
}

/// The outcome of [`RateLimitMiddleware::decide`].
#[derive(Debug)]
pub enum Decision {
    /// The request is within budget (or matched no rule); forward it unchanged.
    Forward,
    /// The request was denied (or authentication failed with a handler configured);
    /// send this response instead of forwarding.
    Respond(HttpResponse),
}

/// Either an authentication failure or a backend failure raised while deciding.
///
/// Kept distinct from [`RateWallError`] because an unhandled auth failure is
/// a different propagation path than a store failure: per spec, the
/// middleware only ever "catches" within the authenticator invocation (by
/// deferring to an `on_auth_error` handler); store errors always bubble.
#[derive(Debug)]
pub enum MiddlewareError {
    /// The authenticator failed and no `on_auth_error` handler was configured.
    Auth(AuthError),
    /// The backend failed to service the request.
    Store(RateWallError),
}

impl std::fmt::Display for MiddlewareError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MiddlewareError::Auth(err) => write!(f, "{err}"),
            MiddlewareError::Store(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for MiddlewareError {}

impl From<RateWallError> for MiddlewareError {
    fn from(err: RateWallError) -> Self {
        MiddlewareError::Store(err)
    }
}

type AuthErrorHandler = Arc<dyn Fn(&AuthError) -> HttpResponse + Send + Sync>;
type BlockedHandler = Arc<dyn Fn(u64) -> HttpResponse + Send + Sync>;

/// The assembled rate-limiting middleware.
///
/// Build with [`RateLimitMiddleware::builder`]; construction validates
/// every config key's regex and fails rather than panicking on a bad
/// pattern.
pub struct RateLimitMiddleware {
    patterns: Vec<(Regex, Vec<Rule>)>,
    authenticator: Arc<dyn Authenticator>,
    backend: Arc<dyn Backend>,
    on_auth_error: Option<AuthErrorHandler>,
    on_blocked: Option<BlockedHandler>,
    retry_after_type: Option<RetryAfterType>,
}

impl RateLimitMiddleware {
    /// Starts a new builder.
    pub fn builder(authenticator: Arc<dyn Authenticator>, backend: Arc<dyn Backend>) -> RateLimitMiddlewareBuilder {
        RateLimitMiddlewareBuilder {
            authenticator,
            backend,
            patterns: Vec::new(),
            on_auth_error: None,
            on_blocked: None,
            retry_after_type: None,
        }
    }

    /// Decides the outcome for one request: forward, or respond with a
    /// denial/auth-error response.
    ///
    /// Iterates patterns in insertion order; the first matching pattern
    /// whose rule list contains the authenticated group wins. A path that
    /// matches no pattern, or a matching pattern with no rule for the
    /// group, always forwards.
    #[instrument(skip(self, req), fields(path = %req.path))]
    pub async fn decide(&self, req: &HttpRequest) -> Result<Decision, MiddlewareError> {
        for (pattern, rules) in &self.patterns {
            if !pattern.is_match(&req.path) {
                continue;
            }

            let (user, group) = match self.authenticator.authenticate(req).await {
                Ok(identity) => identity,
                Err(err) => {
                    warn!(error = %err, "authentication failed");
                    return match &self.on_auth_error {
                        Some(handler) => Ok(Decision::Respond(handler(&err))),
                        None => Err(MiddlewareError::Auth(err)),
                    };
                }
            };

            let Some(rule) = rules.iter().find(|r| r.group() == group) else {
                continue;
            };

            if !rule.has_windows() {
                debug!(group = %group, "rule has no windows, forwarding");
                return Ok(Decision::Forward);
            }

            let counter_path = rule.zone().unwrap_or(req.path.as_str());
            let retry_after = self.backend.retry_after(counter_path, &user, rule).await?;

            if retry_after == 0 {
                return Ok(Decision::Forward);
            }

            debug!(user = %user, retry_after, "request denied");
            return Ok(Decision::Respond(self.blocked_response(retry_after)));
        }

        Ok(Decision::Forward)
    }

    fn blocked_response(&self, retry_after: u64) -> HttpResponse {
        let mut response = match &self.on_blocked {
            Some(handler) => handler(retry_after),
            None => HttpResponse::new().too_many_requests(),
        };

        if let Some(retry_after_type) = self.retry_after_type {
            let value = match retry_after_type {
                RetryAfterType::DelaySeconds => retry_after.to_string(),
                RetryAfterType::HttpDate => {
                    let at = SystemTime::now() + Duration::from_secs(retry_after);
                    DateTime::<Utc>::from(at).format("%a, %d %b %Y %H:%M:%S UTC").to_string()
                }
            };
            response = response.set_header("Retry-After", value);
        }

        response
    }
}

/// Fallible builder for [`RateLimitMiddleware`].
pub struct RateLimitMiddlewareBuilder {
    authenticator: Arc<dyn Authenticator>,
    backend: Arc<dyn Backend>,
    patterns: Vec<(String, Vec<Rule>)>,
    on_auth_error: Option<AuthErrorHandler>,
    on_blocked: Option<BlockedHandler>,
    retry_after_type: Option<RetryAfterType>,
}

impl RateLimitMiddlewareBuilder {
    /// Appends a route: a regex pattern (matched with "search from start"
    /// semantics, i.e. anchored at the beginning of the path) and the
    /// ordered list of rules considered for it.
    ///
    /// Patterns are tried in the order they're added; compilation (and
    /// start-anchoring) is deferred to [`Self::build`] so multiple bad
    /// patterns can't produce partially-constructed state.
    pub fn route(mut self, pattern: impl Into<String>, rules: Vec<Rule>) -> Self {
        self.patterns.push((pattern.into(), rules));
        self
    }

    /// Installs a handler invoked when authentication fails, producing the
    /// response returned to the caller instead of propagating the failure.
    pub fn on_auth_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&AuthError) -> HttpResponse + Send + Sync + 'static,
    {
        self.on_auth_error = Some(Arc::new(handler));
        self
    }

    /// Installs a handler invoked on denial to shape the `429` response body.
    ///
    /// The default response is an empty-bodied `429 Too Many Requests`.
    pub fn on_blocked<F>(mut self, handler: F) -> Self
    where
        F: Fn(u64) -> HttpResponse + Send + Sync + 'static,
    {
        self.on_blocked = Some(Arc::new(handler));
        self
    }

    /// Enables the `Retry-After` header on denial, formatted per `kind`.
    ///
    /// Without calling this, no `Retry-After` header is ever added (the
    /// opt-in design from spec.md §9's open question).
    pub fn retry_after(mut self, kind: RetryAfterType) -> Self {
        self.retry_after_type = Some(kind);
        self
    }

    /// Compiles every route pattern and assembles the middleware.
    ///
    /// Each pattern is matched with "search from start" semantics (like
    /// Python's `re.match`, not `re.search`): a pattern not already anchored
    /// with `^` is anchored for you, so `"/users"` only matches paths that
    /// start with `/users`, never `/api/users`.
    ///
    /// Fails with [`crate::error::RateWallErrorKind::Config`] on the first invalid regex.
    pub fn build(self) -> Result<RateLimitMiddleware, RateWallError> {
        let mut patterns = Vec::with_capacity(self.patterns.len());
        for (pattern, rules) in self.patterns {
            let anchored = if pattern.starts_with('^') {
                pattern
            } else {
                format!("^(?:{pattern})")
            };
            let compiled = Regex::new(&anchored)?;
            patterns.push((compiled, rules));
        }

        if self.on_blocked.is_none() && self.retry_after_type.is_none() {
            debug!("no retry_after configured; denials carry no Retry-After header");
        }

        Ok(RateLimitMiddleware {
            patterns,
            authenticator: self.authenticator,
            backend: self.backend,
            on_auth_error: self.on_auth_error,
            on_blocked: self.on_blocked,
            retry_after_type: self.retry_after_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::IpAuthenticator;
    use crate::backend::memory::MemoryBackend;
    use crate::rule::FixedRule;
    use hyper::Method;

    fn req(path: &str) -> HttpRequest {
        HttpRequest::new(Method::GET, path, "127.0.0.1".parse().unwrap())
    }

    fn middleware(rules: Vec<Rule>) -> RateLimitMiddleware {
        RateLimitMiddleware::builder(
            Arc::new(IpAuthenticator::new()),
            Arc::new(MemoryBackend::new()),
        )
        .route("^/limited", rules)
        .build()
        .unwrap()
    }

    #[tokio::test]
    async fn unmatched_path_always_forwards() {
        let mw = middleware(vec![Rule::Fixed(FixedRule::new("default").second(1))]);
        assert!(matches!(mw.decide(&req("/other")).await.unwrap(), Decision::Forward));
    }

    #[tokio::test]
    async fn first_request_forwards_second_is_denied() {
        let mw = middleware(vec![Rule::Fixed(FixedRule::new("default").second(1))]);
        assert!(matches!(mw.decide(&req("/limited")).await.unwrap(), Decision::Forward));
        match mw.decide(&req("/limited")).await.unwrap() {
            Decision::Respond(res) => assert_eq!(res.status_code(), hyper::StatusCode::TOO_MANY_REQUESTS),
            Decision::Forward => panic!("expected denial"),
        }
    }

    #[tokio::test]
    async fn no_rule_for_group_forwards() {
        let mw = middleware(vec![Rule::Fixed(FixedRule::new("admin").second(1))]);
        assert!(matches!(mw.decide(&req("/limited")).await.unwrap(), Decision::Forward));
        assert!(matches!(mw.decide(&req("/limited")).await.unwrap(), Decision::Forward));
    }

    #[tokio::test]
    async fn retry_after_header_is_added_when_opted_in() {
        let mw = RateLimitMiddleware::builder(
            Arc::new(IpAuthenticator::new()),
            Arc::new(MemoryBackend::new()),
        )
        .route("^/limited", vec![Rule::Fixed(FixedRule::new("default").second(1))])
        .retry_after(RetryAfterType::DelaySeconds)
        .build()
        .unwrap();

        mw.decide(&req("/limited")).await.unwrap();
        match mw.decide(&req("/limited")).await.unwrap() {
            Decision::Respond(res) => assert!(res.headers.contains_key("Retry-After")),
            Decision::Forward => panic!("expected denial"),
        }
    }

    #[test]
    fn invalid_pattern_fails_construction() {
        let result = RateLimitMiddleware::builder(
            Arc::new(IpAuthenticator::new()),
            Arc::new(MemoryBackend::new()),
        )
        .route("(unterminated", vec![])
        .build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn unanchored_pattern_does_not_match_mid_path() {
        let mw = RateLimitMiddleware::builder(
            Arc::new(IpAuthenticator::new()),
            Arc::new(MemoryBackend::new()),
        )
        .route("/users", vec![Rule::Fixed(FixedRule::new("default").second(1))])
        .build()
        .unwrap();

        assert!(matches!(mw.decide(&req("/users")).await.unwrap(), Decision::Forward));
        assert!(matches!(mw.decide(&req("/api/users")).await.unwrap(), Decision::Forward));
    }

    #[tokio::test]
    async fn retry_after_http_date_ends_in_utc_suffix() {
        let mw = RateLimitMiddleware::builder(
            Arc::new(IpAuthenticator::new()),
            Arc::new(MemoryBackend::new()),
        )
        .route("^/limited", vec![Rule::Fixed(FixedRule::new("default").second(1))])
        .retry_after(RetryAfterType::HttpDate)
        .build()
        .unwrap();

        mw.decide(&req("/limited")).await.unwrap();
        match mw.decide(&req("/limited")).await.unwrap() {
            Decision::Respond(res) => {
                let value = res.headers.get("Retry-After").unwrap();
                assert!(value.ends_with(" UTC"), "expected a UTC suffix, got {value}");
                assert!(!value.contains("GMT"));
            }
            Decision::Forward => panic!("expected denial"),
        }
    }
}
