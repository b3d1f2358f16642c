//! # Authenticator
//!
//! The middleware consults an [`Authenticator`] to resolve `(user, group)`
//! for an incoming request. Identity extraction itself — IP parsing, JWT
//! decoding, session lookup — is an external collaborator per spec.md §1;
//! this module only defines the trait and bundles one reference
//! implementation, [`IpAuthenticator`], grounded on the teacher's own
//! client-IP extraction in its rate limiter middleware.

use async_trait::async_trait;

use crate::error::AuthError;
use crate::request::HttpRequest;

/// Resolves the identity and group of the caller for a given request.
///
/// `group` defaults to `"default"` when no group is asserted; callers that
/// don't distinguish groups should simply always return `"default"`.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Resolves `(user, group)` for the request, or fails with an [`AuthError`].
    async fn authenticate(&self, req: &HttpRequest) -> Result<(String, String), AuthError>;
}

/// A bundled authenticator that identifies callers by client IP address.
///
/// Every caller is assigned the `"default"` group. In `proxy` mode, the
/// real client IP is taken from `X-Forwarded-For` (first entry in the
/// comma-separated list), falling back to the direct peer IP.
#[derive(Debug, Clone, Default)]
pub struct IpAuthenticator {
    /// Whether to trust `X-Forwarded-For` when resolving the client IP.
    pub proxy: bool,
}

impl IpAuthenticator {
    /// Creates a direct-connection IP authenticator (no proxy header trust).
    pub fn new() -> Self {
        Self { proxy: false }
    }

    /// Creates an IP authenticator that trusts `X-Forwarded-For`.
    pub fn behind_proxy() -> Self {
        Self { proxy: true }
    }
}

#[async_trait]
impl Authenticator for IpAuthenticator {
    async fn authenticate(&self, req: &HttpRequest) -> Result<(String, String), AuthError> {
        let ip = req.client_ip(self.proxy);
        Ok((ip.to_string(), "default".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::Method;

    #[tokio::test]
    async fn ip_authenticator_returns_default_group() {
        let req = HttpRequest::new(Method::GET, "/a", "1.2.3.4".parse().unwrap());
        let (user, group) = IpAuthenticator::new().authenticate(&req).await.unwrap();
        assert_eq!(user, "1.2.3.4");
        assert_eq!(group, "default");
    }

    #[tokio::test]
    async fn proxy_mode_prefers_forwarded_header() {
        let req = HttpRequest::new(Method::GET, "/a", "10.0.0.1".parse().unwrap())
            .set_header("X-Forwarded-For", "203.0.113.5");
        let (user, _) = IpAuthenticator::behind_proxy()
            .authenticate(&req)
            .await
            .unwrap();
        assert_eq!(user, "203.0.113.5");
    }
}
