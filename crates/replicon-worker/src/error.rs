//! Error taxonomy at the worker boundary: `NotFound | Internal`.
//!
//! Neither variant is a per-follower failure — those are recorded as
//! `FAILED` `OrderMap` rows and never propagate up as a `WorkerError`;
//! per-follower failures are isolated. A `WorkerError` means
//! the *message itself* could not be handled: `NotFound` acks the message
//! (the event is a no-op by design, e.g. a MODIFY/CANCEL with no prior NEW),
//! `Internal` nacks it with a delay so the durable consumer redelivers it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl WorkerError {
    /// `NotFound` is a deliberate no-op, not a failure —
    /// the message is acked. `Internal` means the worker could not complete
    /// a controlled pass, so the message is nacked for redelivery.
    pub fn should_ack(&self) -> bool {
        matches!(self, WorkerError::NotFound(_))
    }
}

impl From<anyhow::Error> for WorkerError {
    fn from(err: anyhow::Error) -> Self {
        WorkerError::Internal(err.to_string())
    }
}
