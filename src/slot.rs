//! Worker slots: a fixed set of scoped threads, each fed indices over its own
//! channel and reporting one `Outcome` per index back to the coordinator.

use crate::error::FanOutError;
use anyhow::Result;
use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, Scope};

/// Result of one callback invocation, consumed exactly once by the coordinator.
pub(crate) struct Outcome {
    pub(crate) slot: usize,
    pub(crate) index: usize,
    pub(crate) result: Result<()>,
}

/// Coordinator-side handle of one worker. Dropping it closes the worker's
/// input, and the worker thread exits once its current item is reported.
pub(crate) struct WorkerSlot {
    id: usize,
    assign_tx: Sender<usize>,
}

impl WorkerSlot {
    pub(crate) fn spawn<'scope, 'env, F>(
        scope: &'scope Scope<'scope, 'env>,
        id: usize,
        work: &'scope F,
        outcomes: Sender<Outcome>,
        name_prefix: Option<&str>,
    ) -> io::Result<Self>
    where
        F: Fn(usize) -> Result<()> + Sync,
    {
        let (assign_tx, assign_rx) = mpsc::channel::<usize>();
        let mut builder = thread::Builder::new();
        if let Some(prefix) = name_prefix {
            builder = builder.name(format!("{prefix}-{id}"));
        }
        builder.spawn_scoped(scope, move || {
            for index in assign_rx {
                let result = invoke(work, index);
                if outcomes.send(Outcome { slot: id, index, result }).is_err() {
                    break;
                }
            }
        })?;
        Ok(Self { id, assign_tx })
    }

    #[inline]
    pub(crate) fn id(&self) -> usize {
        self.id
    }

    /// False only if the worker thread is gone.
    pub(crate) fn assign(&self, index: usize) -> bool {
        self.assign_tx.send(index).is_ok()
    }
}

/// A panic inside `work` becomes an error so the slot still reports and stays usable.
fn invoke<F>(work: &F, index: usize) -> Result<()>
where
    F: Fn(usize) -> Result<()>,
{
    match panic::catch_unwind(AssertUnwindSafe(|| work(index))) {
        Ok(r) => r,
        Err(payload) => Err(FanOutError::Panicked {
            index,
            message: panic_message(payload.as_ref()),
        }
        .into()),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
