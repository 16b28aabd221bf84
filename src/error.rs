//! Failure taxonomy of the executor itself. Callback errors are not wrapped in
//! this enum: they travel as `anyhow::Error` so callers can downcast them back.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FanOutError {
    /// `max_parallel` must be at least 1.
    #[error("max_parallel must be >= 1 (got {0})")]
    InvalidMaxParallel(i64),

    /// Only reachable from the signed entry point.
    #[error("num_items must be >= 0 (got {0})")]
    NegativeItemCount(i64),

    /// The callback panicked; the payload is rendered when it is a string.
    #[error("work item {index} panicked: {message}")]
    Panicked { index: usize, message: String },

    /// An external cancel token fired before every item was dispatched.
    #[error("run cancelled after {completed} of {dispatched} dispatched items completed")]
    Cancelled { completed: usize, dispatched: usize },
}

impl FanOutError {
    /// True for errors detected before any work is dispatched.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::InvalidMaxParallel(_) | Self::NegativeItemCount(_))
    }
}
