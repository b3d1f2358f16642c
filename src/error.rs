use std::fmt::Display;

/// Represents the category or type of error that can occur in ratewall.
///
/// This enum classifies errors for easier handling and reporting. Each variant
/// corresponds to a broad class of error from the taxonomy: construction-time
/// configuration mistakes are kept distinct from request-time store failures,
/// since the middleware propagates the latter but never the former (the
/// middleware can't even be built if construction fails).
///
/// # Variants
///
/// - `Config`: a construction-time error (bad regex, invalid rule, bad retry-after settings).
/// - `Store`: the backing store failed to service a request.
/// - `InvalidInput`: a rule or request value violated an invariant (e.g. `limit == 0`).
#[derive(Debug, PartialEq, Eq)]
pub enum RateWallErrorKind {
    /// A construction-time configuration error.
    Config,
    /// The backing store failed to service a request.
    Store,
    /// The input provided was invalid or malformed.
    InvalidInput,
}

impl Display for RateWallErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RateWallErrorKind::Config => write!(f, "Configuration error"),
            RateWallErrorKind::Store => write!(f, "Store error"),
            RateWallErrorKind::InvalidInput => write!(f, "Invalid input"),
        }
    }
}

/// A structured error type for representing errors in ratewall.
///
/// `RateWallError` encapsulates both the kind of error (using [`RateWallErrorKind`])
/// and a human-readable message describing the error.
///
/// # Examples
///
/// ```rust
/// use ratewall::error::{RateWallError, RateWallErrorKind};
///
/// let err = RateWallError {
///     kind: RateWallErrorKind::InvalidInput,
///     message: "limit must be >= 1".to_string(),
/// };
/// assert_eq!(err.kind, RateWallErrorKind::InvalidInput);
/// ```
#[derive(Debug, PartialEq, Eq)]
pub struct RateWallError {
    /// The category or type of error.
    pub kind: RateWallErrorKind,
    /// A human-readable error message.
    pub message: String,
}

impl RateWallError {
    /// Creates a new `RateWallError` with the specified kind and message.
    ///
    /// # Example
    ///
    /// ```
    /// use ratewall::error::{RateWallError, RateWallErrorKind};
    ///
    /// let err = RateWallError::new(RateWallErrorKind::InvalidInput, "bad rule".to_string());
    /// assert_eq!(err.kind, RateWallErrorKind::InvalidInput);
    /// assert_eq!(err.message, "bad rule");
    /// ```
    pub fn new(kind: RateWallErrorKind, message: String) -> Self {
        Self { kind, message }
    }

    /// Returns a reference to the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns a reference to the error kind.
    pub fn kind(&self) -> &RateWallErrorKind {
        &self.kind
    }
}

impl Display for RateWallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "RateWallError: {{ message: {}, kind: {} }}",
            self.message, self.kind
        )
    }
}

impl std::error::Error for RateWallError {}

impl From<regex::Error> for RateWallError {
    fn from(err: regex::Error) -> Self {
        Self {
            kind: RateWallErrorKind::Config,
            message: err.to_string(),
        }
    }
}

#[cfg(feature = "redis-backend")]
impl From<redis::RedisError> for RateWallError {
    fn from(err: redis::RedisError) -> Self {
        Self {
            kind: RateWallErrorKind::Store,
            message: err.to_string(),
        }
    }
}

/// An authentication failure raised by an [`crate::auth::Authenticator`].
///
/// `EmptyInformation` is kept distinct from `Other` because callers commonly want to
/// respond to "no identity could be extracted" (e.g. no client IP could be determined)
/// differently from a hard authentication failure (e.g. an invalid session token).
#[derive(Debug, PartialEq, Eq)]
pub enum AuthError {
    /// No identifying information could be extracted from the request.
    EmptyInformation,
    /// Any other authentication failure, with a human-readable reason.
    Other(String),
}

impl Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::EmptyInformation => write!(f, "no identity information in request"),
            AuthError::Other(reason) => write!(f, "authentication failed: {reason}"),
        }
    }
}

impl std::error::Error for AuthError {}
