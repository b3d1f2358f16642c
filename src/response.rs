//! # HTTP Response Shaping
//!
//! A trimmed response builder matching the shape the middleware needs to
//! produce a 429 (or anything a caller-supplied blocked-handler emits),
//! patterned after the teacher's own response builder
//! (`status()`/`text()`/`set_header()` chain).

use std::collections::HashMap;

use hyper::StatusCode;

/// A minimal response view the middleware can build and the wrapped
/// application can return unchanged.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub(crate) status_code: StatusCode,
    pub(crate) body: String,
    /// Response headers.
    pub headers: HashMap<String, String>,
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpResponse {
    /// Creates a new `200 OK` response with an empty body.
    pub fn new() -> Self {
        Self {
            status_code: StatusCode::OK,
            body: String::new(),
            headers: HashMap::new(),
        }
    }

    /// Sets the status to `429 Too Many Requests`.
    pub fn too_many_requests(mut self) -> Self {
        self.status_code = StatusCode::TOO_MANY_REQUESTS;
        self
    }

    /// Sets an arbitrary status code.
    pub fn status(mut self, code: u16) -> Self {
        self.status_code =
            StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        self
    }

    /// Sets the response body to the given text.
    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets a response header, overwriting any previous value with the same name.
    pub fn set_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Returns the status code.
    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }

    /// Returns the response body.
    pub fn body(&self) -> &str {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_chain_sets_status_body_and_headers() {
        let res = HttpResponse::new()
            .too_many_requests()
            .text("slow down")
            .set_header("Retry-After", "5");
        assert_eq!(res.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(res.body(), "slow down");
        assert_eq!(res.headers.get("Retry-After").map(String::as_str), Some("5"));
    }
}
