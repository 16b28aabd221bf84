mod config;
mod error;
mod cancel;

mod index;
mod slot;
mod coordinator;
mod summary;
mod executor;

mod progress;
mod util;
mod sequential;
mod concurrency;

pub use crate::config::FanOutOptions;
pub use crate::error::FanOutError;
pub use crate::cancel::CancelToken;
pub use crate::summary::RunSummary;
pub use crate::executor::{execute, execute_signed, FanOut};

// Expose multiprogress hook so several runs can share one terminal.
pub use crate::progress::set_global_multiprogress;

pub use crate::util::init_tracing_once;

// Non-concurrent alternative entry points, plus slice convenience.
pub use crate::sequential::{for_each_sequential, for_each_sequential_indexed};
pub use crate::concurrency::for_each_limited;
