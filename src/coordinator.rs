//! Coordinator: owns the run state, seeds and refills worker slots, and drains
//! every dispatched slot before returning.
//!
//! Phases: `Filling -> Steady -> Draining -> {Succeeded | Failed | Cancelled}`.
//! When several items fail concurrently, the error kept is the first one received
//! on the outcome channel. That is completion order, so it is nondeterministic with
//! respect to the failing indices.

use crate::cancel::CancelToken;
use crate::config::FanOutOptions;
use crate::error::FanOutError;
use crate::index::IndexSource;
use crate::progress::make_count_progress;
use crate::slot::{Outcome, WorkerSlot};
use crate::summary::RunSummary;
use anyhow::{anyhow, Error, Result};
use indicatif::ProgressBar;
use std::sync::mpsc;
use std::thread;
use std::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Filling,
    Steady,
    Draining,
}

/// Private to the coordinator; worker slots only ever see their own index.
struct RunState {
    source: IndexSource,
    phase: Phase,
    in_flight: usize,
    peak_in_flight: usize,
    completed: usize,
    first_error: Option<Error>,
    cancelled: bool,
}

impl RunState {
    fn new(items: usize) -> Self {
        Self {
            source: IndexSource::new(items),
            phase: Phase::Filling,
            in_flight: 0,
            peak_in_flight: 0,
            completed: 0,
            first_error: None,
            cancelled: false,
        }
    }

    fn may_dispatch(&self) -> bool {
        self.phase != Phase::Draining && !self.source.is_exhausted()
    }
}

pub(crate) struct Coordinator<'a> {
    items: usize,
    budget: usize,
    opts: &'a FanOutOptions,
    token: &'a CancelToken,
}

impl<'a> Coordinator<'a> {
    /// `budget` must already be validated (>= 1) and clamped to `items`.
    /// `token` is private to this run: the coordinator cancels it on the first failure.
    pub(crate) fn new(items: usize, budget: usize, opts: &'a FanOutOptions, token: &'a CancelToken) -> Self {
        debug_assert!(budget >= 1 && budget <= items);
        Self { items, budget, opts, token }
    }

    pub(crate) fn run<F>(&self, work: &F) -> Result<RunSummary>
    where
        F: Fn(usize) -> Result<()> + Sync,
    {
        let started = Instant::now();
        let pb = if self.opts.progress {
            Some(make_count_progress(self.items as u64, self.opts.progress_label.as_deref().unwrap_or("")))
        } else {
            None
        };

        let (tx, rx) = mpsc::channel::<Outcome>();
        let mut state = RunState::new(self.items);

        thread::scope(|scope| {
            let slots = self.spawn_slots(scope, work, &tx, &mut state);

            for slot in &slots {
                if !state.may_dispatch() {
                    break;
                }
                self.dispatch_next(slot, &mut state);
            }
            if state.phase == Phase::Filling {
                state.phase = if state.source.is_exhausted() { Phase::Draining } else { Phase::Steady };
            }
            tracing::debug!(slots = slots.len(), seeded = state.in_flight, phase = ?state.phase, "fan-out seeded");

            while state.in_flight > 0 {
                // `tx` is still held here, so `recv` cannot fail while items are outstanding.
                let Ok(outcome) = rx.recv() else { break };
                state.in_flight -= 1;
                let slot = outcome.slot;
                self.observe(outcome, &mut state, pb.as_ref());

                if state.phase == Phase::Steady {
                    self.dispatch_next(&slots[slot], &mut state);
                    if state.source.is_exhausted() && state.phase == Phase::Steady {
                        tracing::debug!(issued = state.source.issued(), "all items issued; draining");
                        state.phase = Phase::Draining;
                    }
                }
            }
            // Closing every slot's input lets the workers exit before the scope joins them.
            drop(slots);
        });
        drop(tx);

        let summary = RunSummary {
            items: self.items,
            max_parallel: self.budget,
            dispatched: state.source.issued(),
            completed: state.completed,
            peak_in_flight: state.peak_in_flight,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        if let Some(err) = state.first_error {
            if let Some(pb) = pb {
                pb.abandon_with_message("failed");
            }
            if let Some(label) = &self.opts.label {
                tracing::info!(label = %label, ?summary, "fan-out failed");
            }
            return Err(err);
        }
        if state.cancelled {
            if let Some(pb) = pb {
                pb.abandon_with_message("cancelled");
            }
            if let Some(label) = &self.opts.label {
                tracing::info!(label = %label, ?summary, "fan-out cancelled");
            }
            return Err(FanOutError::Cancelled {
                completed: summary.completed,
                dispatched: summary.dispatched,
            }
            .into());
        }

        debug_assert_eq!(summary.completed, self.items);
        if let Some(pb) = pb {
            pb.finish_with_message("done");
        }
        if let Some(label) = &self.opts.label {
            tracing::info!(label = %label, items = summary.items, elapsed_ms = summary.elapsed_ms, "fan-out finished");
        }
        Ok(summary)
    }

    /// Start up to `budget` workers. Running short of threads shrinks the budget;
    /// getting none at all fails the run before any item is issued.
    fn spawn_slots<'scope, 'env, F>(
        &self,
        scope: &'scope thread::Scope<'scope, 'env>,
        work: &'scope F,
        tx: &mpsc::Sender<Outcome>,
        state: &mut RunState,
    ) -> Vec<WorkerSlot>
    where
        F: Fn(usize) -> Result<()> + Sync,
    {
        let mut slots = Vec::with_capacity(self.budget);
        for id in 0..self.budget {
            match WorkerSlot::spawn(scope, id, work, tx.clone(), self.opts.thread_name_prefix.as_deref()) {
                Ok(slot) => slots.push(slot),
                Err(e) if !slots.is_empty() => {
                    tracing::warn!(requested = self.budget, spawned = slots.len(), error = %e, "could not start every worker slot; running with fewer");
                    break;
                }
                Err(e) => {
                    state.first_error = Some(Error::new(e).context("spawn worker slot"));
                    state.phase = Phase::Draining;
                    break;
                }
            }
        }
        slots
    }

    /// Hand the next index to `slot`, unless the run token has been cancelled.
    fn dispatch_next(&self, slot: &WorkerSlot, state: &mut RunState) {
        if self.token.is_cancelled() {
            if state.first_error.is_none() && !state.cancelled {
                tracing::warn!(issued = state.source.issued(), "cancel requested; no further items will be dispatched");
                state.cancelled = true;
            }
            state.phase = Phase::Draining;
            return;
        }
        let Some(index) = state.source.next() else {
            return;
        };

        if slot.assign(index) {
            state.in_flight += 1;
            state.peak_in_flight = state.peak_in_flight.max(state.in_flight);
            tracing::trace!(index, slot = slot.id(), in_flight = state.in_flight, "dispatched");
        } else {
            let err = anyhow!("worker slot {} exited before item {index} was handed over", slot.id());
            self.record_failure(index, err, state);
        }
    }

    fn observe(&self, outcome: Outcome, state: &mut RunState, pb: Option<&ProgressBar>) {
        let Outcome { index, result, .. } = outcome;
        match result {
            Ok(()) => {
                state.completed += 1;
                if let Some(pb) = pb {
                    pb.inc(1);
                }
            }
            Err(err) => {
                let err = err.context(format!("work item {index} failed"));
                self.record_failure(index, err, state);
            }
        }
    }

    fn record_failure(&self, index: usize, err: Error, state: &mut RunState) {
        if state.first_error.is_some() {
            tracing::debug!(index, error = %format!("{err:#}"), "discarding error observed after the first failure");
            return;
        }
        tracing::warn!(index, error = %format!("{err:#}"), in_flight = state.in_flight, "work item failed; draining in-flight items");
        state.first_error = Some(err);
        state.phase = Phase::Draining;
        self.token.cancel();
    }
}
