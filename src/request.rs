//! # HTTP Request Context
//!
//! A trimmed-down request view for the middleware contract: just enough
//! of an incoming HTTP request (method, path, headers, client IP) for
//! pattern matching and authentication to work, without pulling in the
//! rest of a full web framework's body-parsing, cookie, or routing
//! machinery (out of scope for this crate; see spec.md §1).

use std::collections::HashMap;
use std::net::IpAddr;

use hyper::Method;

/// A minimal incoming-request view passed through the middleware chain.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// The HTTP method of the incoming request.
    pub method: Method,
    /// The request path, e.g. `"/orders/42"`.
    pub path: String,
    /// Request headers. Lookups are case-insensitive.
    pub headers: HashMap<String, String>,
    /// The IP address of the direct TCP peer.
    pub ip: IpAddr,
}

impl HttpRequest {
    /// Creates a new request view for the given method, path and peer IP.
    pub fn new(method: Method, path: impl Into<String>, ip: IpAddr) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HashMap::new(),
            ip,
        }
    }

    /// Returns a header value by name, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| k.to_ascii_lowercase() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Sets a header value, overwriting any previous value with the same name.
    pub fn set_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Extracts the client IP, honoring `X-Forwarded-For` when `trust_proxy` is set.
    ///
    /// Takes the first address in a comma-separated `X-Forwarded-For` list
    /// (the address closest to the client), falling back to the direct peer
    /// IP if the header is absent or empty.
    pub fn client_ip(&self, trust_proxy: bool) -> IpAddr {
        if trust_proxy {
            if let Some(forwarded) = self.header("X-Forwarded-For") {
                if let Some(first) = forwarded.split(',').next() {
                    if let Ok(parsed) = first.trim().parse() {
                        return parsed;
                    }
                }
            }
        }
        self.ip
    }
}
