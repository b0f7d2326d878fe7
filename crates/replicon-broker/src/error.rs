use thiserror::Error;

/// Error taxonomy as seen at the Broker Client trust boundary.
///
/// `Auth` and `Rejected` are never retried by the client itself;
/// `RateLimited` and `Transient` are retried internally with backoff and, if
/// still failing once the retry budget is exhausted, surface up to the
/// caller as this same variant so it can be recorded as a per-follower
/// failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("broker auth failed: {0}")]
    Auth(String),

    #[error("broker rate limited: {0}")]
    RateLimited(String),

    #[error("transient broker failure: {0}")]
    Transient(String),

    #[error("broker rejected: {0}")]
    Rejected(String),

    #[error("invalid broker response: {0}")]
    InvalidResponse(String),
}

impl BrokerError {
    /// Retry policy: only `RateLimited` and `Transient` are retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BrokerError::RateLimited(_) | BrokerError::Transient(_))
    }
}
