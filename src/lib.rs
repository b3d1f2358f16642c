#![warn(missing_docs)]

//! # ratewall
//!
//! `ratewall` is a per-identity, per-path rate-limiting middleware. It
//! decides, for each incoming request, whether a configured rule applies,
//! resolves the caller's identity and group, checks remaining budget
//! against a pluggable backend, and either forwards the request or emits a
//! `429` with an optional `Retry-After`.
//!
//! The limiting engine is the focus of this crate: rule matching, two
//! counter algorithms (fixed-window and sliding-window) with atomic update
//! protocols, block-time promotion, and an in-memory backend with expiry
//! scheduling. Identity extraction beyond the bundled [`auth::IpAuthenticator`],
//! the wrapped application, and the backing store itself are external
//! collaborators.
//!
//! ## Modules
//!
//! - [`rule`] - Rate-limiting policies ([`rule::FixedRule`], [`rule::CustomRule`]) and their expansion into counter keys.
//! - [`backend`] - The [`backend::Backend`] contract and its bundled implementations.
//! - [`auth`] - The [`auth::Authenticator`] contract and a reference IP-based implementation.
//! - [`middleware`] - [`middleware::RateLimitMiddleware`], assembling rules, backend and authenticator into the per-request decision flow.
//! - [`request`] / [`response`] - Minimal HTTP request/response views.
//! - [`error`] - Structured error types used throughout the crate.

/// Rate-limiting policies and their expansion into counter keys.
///
/// See [`rule::Rule`] for details.
pub mod rule;

/// The backend contract and its bundled implementations.
///
/// See [`backend::Backend`] for details.
pub mod backend;

/// The authenticator contract and a reference IP-based implementation.
pub mod auth;

/// The rate-limiting middleware and its fallible builder.
///
/// See [`middleware::RateLimitMiddleware`] for details.
pub mod middleware;

/// A minimal incoming-request view.
pub mod request;

/// A minimal response builder.
pub mod response;

/// Error types and utilities for ratewall.
///
/// See [`error::RateWallError`] and [`error::RateWallErrorKind`] for details.
pub mod error;

pub use auth::{Authenticator, IpAuthenticator};
pub use backend::Backend;
pub use backend::memory::MemoryBackend;
pub use error::{AuthError, RateWallError, RateWallErrorKind};
pub use middleware::{Decision, MiddlewareError, RateLimitMiddleware, RetryAfterType};
pub use request::HttpRequest;
pub use response::HttpResponse;
pub use rule::{CustomRule, FixedRule, Rule};

#[cfg(feature = "redis-backend")]
pub use backend::fixed_window::FixedWindowBackend;
#[cfg(feature = "redis-backend")]
pub use backend::sliding_window::SlidingWindowBackend;
