//! Cooperative cancellation flag shared between the caller, the coordinator and callbacks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable cancel flag. Cancelling never interrupts running work; it stops new
/// dispatch and lets callbacks that poll `is_cancelled()` bail out early.
///
/// A token made with [`CancelToken::child`] also reports cancelled once any of its
/// ancestors is cancelled, but cancelling the child leaves the ancestors untouched.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    ancestors: Vec<Arc<AtomicBool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(&self) -> Self {
        let mut ancestors = self.ancestors.clone();
        ancestors.push(Arc::clone(&self.flag));
        Self { flag: Arc::default(), ancestors }
    }

    /// Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire) || self.ancestors.iter().any(|a| a.load(Ordering::Acquire))
    }
}
