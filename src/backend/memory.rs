//! # In-Memory Backend
//!
//! A single-process equivalent of the fixed-window semantics with no
//! external dependency. Grounded on the original source's
//! `backends/simple.py` `MemoryBackend`, generalized to serve both
//! [`crate::rule::FixedRule`] and [`crate::rule::CustomRule`] via
//! [`crate::rule::Rule::ruleset`], and on the teacher's own
//! `tokio::spawn`-based background cleanup pattern in its rate limiter
//! middleware.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ahash::AHashMap;
use async_trait::async_trait;

use super::Backend;
use crate::error::RateWallError;
use crate::rule::Rule;

#[derive(Debug, Clone, Copy)]
struct CounterEntry {
    count: i64,
    deadline: Instant,
}

#[derive(Default)]
struct State {
    /// user -> block deadline
    blocked_users: AHashMap<String, Instant>,
    /// path -> rule_key -> entry
    blocks: AHashMap<String, AHashMap<String, CounterEntry>>,
}

/// Single-process in-memory rate-limiting backend.
///
/// State lives behind one process-wide `std::sync::Mutex` (the critical
/// section never awaits, so a synchronous mutex is used rather than an
/// async one -- per spec.md §5's "brief mutex" characterization).
/// Expiry is cooperative: a `tokio::spawn` task is scheduled per fresh
/// entry to remove it at its deadline, but a missed or raced cleanup is
/// harmless -- the lazy deadline check on next access re-initializes the
/// entry regardless, so budget never leaks even if the timer is lost.
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Creates an empty in-memory backend.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Number of paths currently tracked (for diagnostics/tests).
    pub fn tracked_path_count(&self) -> usize {
        self.state.lock().unwrap().blocks.len()
    }
}

fn schedule_rule_cleanup(state: Arc<Mutex<State>>, path: String, rule_key: String, deadline: Instant) {
    tokio::spawn(async move {
        tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
        let mut guard = state.lock().unwrap();
        if let Some(rules) = guard.blocks.get_mut(&path) {
            if matches!(rules.get(&rule_key), Some(entry) if entry.deadline <= Instant::now()) {
                rules.remove(&rule_key);
            }
        }
    });
}

fn schedule_user_cleanup(state: Arc<Mutex<State>>, user: String, deadline: Instant) {
    tokio::spawn(async move {
        tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
        let mut guard = state.lock().unwrap();
        if matches!(guard.blocked_users.get(&user), Some(&d) if d <= Instant::now()) {
            guard.blocked_users.remove(&user);
        }
    });
}

/// Rounds `deadline - now` up to whole seconds, never returning `0` (a
/// `0` retry-after would be indistinguishable from "allowed" under the
/// backend contract, and a caller that retries before a fractional second
/// has elapsed would be denied again anyway).
fn secs_until(deadline: Instant, now: Instant) -> u64 {
    let remaining = deadline.saturating_duration_since(now);
    let whole_secs = remaining.as_secs();
    let rounded = if remaining.subsec_nanos() > 0 { whole_secs + 1 } else { whole_secs };
    rounded.max(1)
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn retry_after(&self, path: &str, user: &str, rule: &Rule) -> Result<u64, RateWallError> {
        let ruleset = rule.ruleset(path, user)?;
        let now = Instant::now();

        let mut retry_after_secs: u64 = 0;
        let mut freshly_blocked_deadline: Option<Instant> = None;

        {
            let mut guard = self.state.lock().unwrap();

            if let Some(&deadline) = guard.blocked_users.get(user) {
                if deadline > now {
                    return Ok(secs_until(deadline, now));
                }
            }

            let rules = guard.blocks.entry(path.to_string()).or_default();

            for window in &ruleset {
                let fresh_deadline = now + Duration::from_secs(window.window_seconds);
                match rules.get_mut(&window.key) {
                    None => {
                        rules.insert(
                            window.key.clone(),
                            CounterEntry {
                                count: window.limit as i64 - 1,
                                deadline: fresh_deadline,
                            },
                        );
                        schedule_rule_cleanup(
                            self.state.clone(),
                            path.to_string(),
                            window.key.clone(),
                            fresh_deadline,
                        );
                    }
                    Some(entry) if entry.deadline <= now => {
                        *entry = CounterEntry {
                            count: window.limit as i64 - 1,
                            deadline: fresh_deadline,
                        };
                        schedule_rule_cleanup(
                            self.state.clone(),
                            path.to_string(),
                            window.key.clone(),
                            fresh_deadline,
                        );
                    }
                    Some(entry) if entry.count < 1 => {
                        retry_after_secs = secs_until(entry.deadline, now);
                        break;
                    }
                    Some(entry) => {
                        entry.count -= 1;
                    }
                }
            }

            if retry_after_secs > 0 {
                if let Some(block_time) = rule.block_time() {
                    let deadline = now + Duration::from_secs(block_time);
                    guard.blocked_users.insert(user.to_string(), deadline);
                    freshly_blocked_deadline = Some(deadline);
                    retry_after_secs = block_time;
                }
            }
        }

        if let Some(deadline) = freshly_blocked_deadline {
            schedule_user_cleanup(self.state.clone(), user.to_string(), deadline);
        }

        Ok(retry_after_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::FixedRule;
    use std::time::Duration as StdDuration;

    fn fixed(rule: FixedRule) -> Rule {
        Rule::Fixed(rule)
    }

    #[tokio::test]
    async fn first_request_is_admitted() {
        let backend = MemoryBackend::new();
        let rule = fixed(FixedRule::new("default").second(1));
        assert_eq!(backend.retry_after("/p", "u1", &rule).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn second_request_within_window_is_denied() {
        let backend = MemoryBackend::new();
        let rule = fixed(FixedRule::new("default").second(1));
        assert_eq!(backend.retry_after("/p", "u1", &rule).await.unwrap(), 0);
        let retry = backend.retry_after("/p", "u1", &rule).await.unwrap();
        assert!(retry >= 1 && retry <= 1, "retry_after should be within the 1s window: {retry}");
    }

    #[tokio::test]
    async fn request_after_window_elapses_is_admitted_again() {
        let backend = MemoryBackend::new();
        let rule = fixed(FixedRule::new("default").second(1));
        assert_eq!(backend.retry_after("/p", "u1", &rule).await.unwrap(), 0);
        tokio::time::sleep(StdDuration::from_millis(1100)).await;
        assert_eq!(backend.retry_after("/p", "u1", &rule).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn distinct_users_have_independent_budgets() {
        let backend = MemoryBackend::new();
        let rule = fixed(FixedRule::new("default").second(1));
        assert_eq!(backend.retry_after("/p", "u1", &rule).await.unwrap(), 0);
        assert_eq!(backend.retry_after("/p", "u2", &rule).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn block_time_promotes_retry_after_and_blocks_other_paths() {
        let backend = MemoryBackend::new();
        let rule = fixed(FixedRule::new("default").second(1).block_time(5));
        assert_eq!(backend.retry_after("/a", "u1", &rule).await.unwrap(), 0);
        let retry = backend.retry_after("/a", "u1", &rule).await.unwrap();
        assert_eq!(retry, 5);

        let other_rule = fixed(FixedRule::new("default").second(1));
        let retry_other_path = backend.retry_after("/b", "u1", &other_rule).await.unwrap();
        assert_eq!(retry_other_path, 5, "blocking state must apply across paths");
    }

    #[tokio::test]
    async fn multi_window_rule_denies_on_the_first_exhausted_bucket() {
        let backend = MemoryBackend::new();
        let rule = fixed(FixedRule::new("default").second(1).minute(1));
        assert_eq!(backend.retry_after("/p", "u1", &rule).await.unwrap(), 0);
        let retry = backend.retry_after("/p", "u1", &rule).await.unwrap();
        assert!(retry >= 1 && retry <= 1, "second bucket should be reported first: {retry}");
    }

    #[tokio::test]
    async fn rule_with_no_windows_always_admits() {
        let backend = MemoryBackend::new();
        let rule = fixed(FixedRule::new("default"));
        for _ in 0..5 {
            assert_eq!(backend.retry_after("/p", "u1", &rule).await.unwrap(), 0);
        }
    }
}
