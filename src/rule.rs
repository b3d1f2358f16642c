//! # Rule Module
//!
//! Describes a rate-limiting policy and its expansion into the set of
//! counter keys a backend must track for one `(path, user)` pair.
//!
//! A [`Rule`] is either [`FixedRule`] (one independent limit per standard
//! bucket: second/minute/hour/day/month) or [`CustomRule`] (an arbitrary
//! ordered list of `(limit, granularity_seconds)` windows). Both share the
//! same surface through [`Rule::group`], [`Rule::block_time`], [`Rule::zone`]
//! and [`Rule::ruleset`].
//!
//! ## Example
//!
//! ```
//! use ratewall::rule::{FixedRule, Rule};
//!
//! let rule = Rule::Fixed(FixedRule::new("default").second(1).minute(3));
//! let windows = rule.ruleset("/orders", "user-1").unwrap();
//! assert_eq!(windows.len(), 2);
//! assert_eq!(windows[0].key, "/orders:user-1:second");
//! ```

use crate::error::{RateWallError, RateWallErrorKind};

/// The standard fixed-window buckets, in the order they are evaluated.
///
/// This order matters: it is the tie-break spec.md §4.3 step 4 relies on
/// ("the first such exhausted window") and the order [`FixedRule::ruleset`]
/// walks its buckets in.
pub const BUCKETS: [(&str, u64); 5] = [
    ("second", 1),
    ("minute", 60),
    ("hour", 3_600),
    ("day", 86_400),
    ("month", 2_678_400),
];

/// One expanded counter key and its `(limit, window_seconds)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleWindow {
    /// The store-side counter key, e.g. `"/orders:user-1:second"`.
    pub key: String,
    /// The maximum number of requests admitted within `window_seconds`.
    pub limit: u64,
    /// The window size, in seconds.
    pub window_seconds: u64,
}

/// A fixed-window rate limit rule.
///
/// Each bucket (`second`, `minute`, `hour`, `day`, `month`) is an independent
/// window; a bucket left `None` has no constraint. At least one bucket must
/// be set for the rule to apply (a rule with no windows configured is
/// equivalent to no rule, per spec.md §8).
#[derive(Debug, Clone, Default)]
pub struct FixedRule {
    /// The group label this rule applies to.
    pub group: String,
    /// Limit for the 1-second window.
    pub second: Option<u64>,
    /// Limit for the 60-second window.
    pub minute: Option<u64>,
    /// Limit for the 3600-second window.
    pub hour: Option<u64>,
    /// Limit for the 86400-second window.
    pub day: Option<u64>,
    /// Limit for the 2,678,400-second (31-day) window.
    pub month: Option<u64>,
    /// Penalty duration, in seconds, applied on exhaustion.
    pub block_time: Option<u64>,
    /// Overrides the path used in the counter key, to share budget across paths.
    pub zone: Option<String>,
}

impl FixedRule {
    /// Creates a new fixed rule for the given group with no windows configured.
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            ..Default::default()
        }
    }

    /// Sets the per-second limit.
    pub fn second(mut self, limit: u64) -> Self {
        self.second = Some(limit);
        self
    }

    /// Sets the per-minute limit.
    pub fn minute(mut self, limit: u64) -> Self {
        self.minute = Some(limit);
        self
    }

    /// Sets the per-hour limit.
    pub fn hour(mut self, limit: u64) -> Self {
        self.hour = Some(limit);
        self
    }

    /// Sets the per-day limit.
    pub fn day(mut self, limit: u64) -> Self {
        self.day = Some(limit);
        self
    }

    /// Sets the per-month (31-day) limit.
    pub fn month(mut self, limit: u64) -> Self {
        self.month = Some(limit);
        self
    }

    /// Sets the block duration applied once a denial occurs.
    pub fn block_time(mut self, seconds: u64) -> Self {
        self.block_time = Some(seconds);
        self
    }

    /// Overrides the counter-key path with a shared zone name.
    pub fn zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    /// Returns `true` when at least one bucket is configured.
    pub fn has_windows(&self) -> bool {
        self.second.is_some()
            || self.minute.is_some()
            || self.hour.is_some()
            || self.day.is_some()
            || self.month.is_some()
    }

    fn bucket_limit(&self, name: &str) -> Option<u64> {
        match name {
            "second" => self.second,
            "minute" => self.minute,
            "hour" => self.hour,
            "day" => self.day,
            "month" => self.month,
            _ => None,
        }
    }

    fn ruleset(&self, path: &str, user: &str) -> Result<Vec<RuleWindow>, RateWallError> {
        let base = self.zone.as_deref().unwrap_or(path);
        let mut windows = Vec::with_capacity(5);
        for (name, window_seconds) in BUCKETS {
            if let Some(limit) = self.bucket_limit(name) {
                validate(limit, window_seconds)?;
                windows.push(RuleWindow {
                    key: format!("{base}:{user}:{name}"),
                    limit,
                    window_seconds,
                });
            }
        }
        Ok(windows)
    }
}

/// A rule built from an arbitrary ordered list of `(limit, granularity_seconds)` windows.
///
/// Unlike [`FixedRule`], a `CustomRule` is not restricted to the standard buckets:
/// each entry in `windows` is an independent window evaluated in list order.
#[derive(Debug, Clone, Default)]
pub struct CustomRule {
    /// The group label this rule applies to.
    pub group: String,
    /// Ordered `(limit, granularity_seconds)` pairs, each an independent window.
    pub windows: Vec<(u64, u64)>,
    /// Penalty duration, in seconds, applied on exhaustion.
    pub block_time: Option<u64>,
    /// Overrides the path used in the counter key, to share budget across paths.
    pub zone: Option<String>,
}

impl CustomRule {
    /// Creates a new custom rule for the given group with no windows configured.
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            ..Default::default()
        }
    }

    /// Appends a `(limit, granularity_seconds)` window to the rule.
    pub fn window(mut self, limit: u64, granularity_seconds: u64) -> Self {
        self.windows.push((limit, granularity_seconds));
        self
    }

    /// Sets the block duration applied once a denial occurs.
    pub fn block_time(mut self, seconds: u64) -> Self {
        self.block_time = Some(seconds);
        self
    }

    /// Overrides the counter-key path with a shared zone name.
    pub fn zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    fn ruleset(&self, path: &str, user: &str) -> Result<Vec<RuleWindow>, RateWallError> {
        let base = self.zone.as_deref().unwrap_or(path);
        let mut windows = Vec::with_capacity(self.windows.len());
        for (limit, granularity) in &self.windows {
            validate(*limit, *granularity)?;
            windows.push(RuleWindow {
                key: format!("{base}:{user}:{limit}/{granularity}"),
                limit: *limit,
                window_seconds: *granularity,
            });
        }
        Ok(windows)
    }
}

fn validate(limit: u64, window_seconds: u64) -> Result<(), RateWallError> {
    if limit < 1 {
        return Err(RateWallError::new(
            RateWallErrorKind::InvalidInput,
            "rule limit must be >= 1".to_string(),
        ));
    }
    if window_seconds < 1 {
        return Err(RateWallError::new(
            RateWallErrorKind::InvalidInput,
            "rule window_seconds must be >= 1".to_string(),
        ));
    }
    Ok(())
}

/// A rate-limiting policy: either a [`FixedRule`] or a [`CustomRule`].
///
/// Both variants are equally first-class; the distinction only affects how
/// [`Rule::ruleset`] expands the policy into counter keys.
#[derive(Debug, Clone)]
pub enum Rule {
    /// A rule built from the standard second/minute/hour/day/month buckets.
    Fixed(FixedRule),
    /// A rule built from an arbitrary ordered list of windows.
    Custom(CustomRule),
}

impl Rule {
    /// The group label this rule applies to.
    pub fn group(&self) -> &str {
        match self {
            Rule::Fixed(r) => &r.group,
            Rule::Custom(r) => &r.group,
        }
    }

    /// The penalty duration, in seconds, if this rule configures one.
    pub fn block_time(&self) -> Option<u64> {
        match self {
            Rule::Fixed(r) => r.block_time,
            Rule::Custom(r) => r.block_time,
        }
    }

    /// The zone override, if set.
    pub fn zone(&self) -> Option<&str> {
        match self {
            Rule::Fixed(r) => r.zone.as_deref(),
            Rule::Custom(r) => r.zone.as_deref(),
        }
    }

    /// Returns `true` when the rule has at least one window configured.
    ///
    /// A rule with no windows is equivalent to no rule: the middleware
    /// forwards the request without consulting the backend.
    pub fn has_windows(&self) -> bool {
        match self {
            Rule::Fixed(r) => r.has_windows(),
            Rule::Custom(r) => !r.windows.is_empty(),
        }
    }

    /// Expands this rule into the ordered set of counter keys for `(path, user)`.
    ///
    /// The returned order is significant: backends pick the first exhausted
    /// window (fixed-window) or the longest wait among exhausted windows
    /// (sliding-window) by walking this list in order.
    pub fn ruleset(&self, path: &str, user: &str) -> Result<Vec<RuleWindow>, RateWallError> {
        match self {
            Rule::Fixed(r) => r.ruleset(path, user),
            Rule::Custom(r) => r.ruleset(path, user),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_rule_expands_configured_buckets_in_order() {
        let rule = Rule::Fixed(FixedRule::new("default").second(1).day(100));
        let windows = rule.ruleset("/a", "u1").unwrap();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].key, "/a:u1:second");
        assert_eq!(windows[0].window_seconds, 1);
        assert_eq!(windows[1].key, "/a:u1:day");
        assert_eq!(windows[1].window_seconds, 86_400);
    }

    #[test]
    fn fixed_rule_with_no_buckets_has_no_windows() {
        let rule = Rule::Fixed(FixedRule::new("default"));
        assert!(!rule.has_windows());
        assert!(rule.ruleset("/a", "u1").unwrap().is_empty());
    }

    #[test]
    fn zone_overrides_path_in_counter_key() {
        let rule = Rule::Fixed(FixedRule::new("default").second(1).zone("common"));
        let windows = rule.ruleset("/message", "u1").unwrap();
        assert_eq!(windows[0].key, "common:u1:second");
    }

    #[test]
    fn custom_rule_preserves_window_order_and_key_format() {
        let rule = Rule::Custom(CustomRule::new("default").window(5, 10).window(100, 3600));
        let windows = rule.ruleset("/api", "u2").unwrap();
        assert_eq!(windows[0].key, "/api:u2:5/10");
        assert_eq!(windows[1].key, "/api:u2:100/3600");
    }

    #[test]
    fn zero_limit_is_rejected() {
        let rule = Rule::Custom(CustomRule::new("default").window(0, 10));
        let err = rule.ruleset("/api", "u2").unwrap_err();
        assert_eq!(*err.kind(), RateWallErrorKind::InvalidInput);
    }

    #[test]
    fn zero_window_is_rejected() {
        let rule = Rule::Custom(CustomRule::new("default").window(1, 0));
        assert!(rule.ruleset("/api", "u2").is_err());
    }
}
