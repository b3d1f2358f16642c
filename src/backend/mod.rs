//! # Backend Contract
//!
//! Every backend exposes one operation, [`Backend::retry_after`], which
//! either admits the request (returning `0`) or reports how long the
//! caller should wait before retrying.
//!
//! Three backends are bundled:
//! - [`memory::MemoryBackend`] — process-local, no external dependency.
//! - [`fixed_window::FixedWindowBackend`] — Redis-backed, boundary-aligned windows (requires `redis-backend`).
//! - [`sliding_window::SlidingWindowBackend`] — Redis-backed, true sliding windows (requires `redis-backend`).

pub mod memory;

#[cfg(feature = "redis-backend")]
pub mod fixed_window;
#[cfg(feature = "redis-backend")]
pub mod sliding_window;

use async_trait::async_trait;

use crate::error::RateWallError;
use crate::rule::Rule;

/// The store-side contract every rate-limiting backend implements.
///
/// # Contract
///
/// - Returns `0` when the request is permitted; one unit of budget has
///   already been consumed by the time this returns.
/// - Returns a positive integer `s` when denied: the minimum wait in
///   seconds before a retry is likely to succeed.
/// - Must be atomic with respect to budget consumption: two concurrent
///   calls that both observe the last remaining slot must not both
///   return `0`.
/// - Must check blocking state first; if blocked, returns the remaining
///   block time without touching counters.
/// - When the rule has `block_time` set and a denial occurs, must set
///   the penalty state and return `block_time`, overriding whatever
///   shorter `retry_after` would otherwise apply.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Consults and updates budget for `(path, user)` under `rule`.
    ///
    /// Returns `Ok(0)` to admit, `Ok(s)` with `s > 0` to deny with a
    /// retry-after of `s` seconds, or `Err` on store failure (propagated,
    /// never silently resolved to allow or deny).
    async fn retry_after(&self, path: &str, user: &str, rule: &Rule) -> Result<u64, RateWallError>;
}

/// The store key used for a user's blocking/penalty state.
pub(crate) fn blocking_key(user: &str) -> String {
    format!("blocking:{user}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocking_key_format_is_stable() {
        assert_eq!(blocking_key("alice"), "blocking:alice");
    }
}
