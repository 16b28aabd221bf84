use crate::cancel::CancelToken;
use crate::config::FanOutOptions;
use crate::coordinator::Coordinator;
use crate::error::FanOutError;
use crate::summary::RunSummary;
use anyhow::{Context, Result};

/// Builder over `FanOutOptions` plus an optional external cancel token.
#[derive(Clone, Debug, Default)]
pub struct FanOut {
    pub(crate) opts: FanOutOptions,
    token: Option<CancelToken>,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(opts: FanOutOptions) -> Self {
        Self { opts, token: None }
    }

    // -------- Builder methods --------
    pub fn max_parallel(mut self, n: usize) -> Self { self.opts = self.opts.with_max_parallel(n); self }
    pub fn progress(mut self, yes: bool) -> Self { self.opts = self.opts.with_progress(yes); self }
    pub fn progress_label(mut self, label: impl Into<String>) -> Self { self.opts = self.opts.with_progress_label(label); self }
    pub fn label(mut self, label: impl Into<String>) -> Self { self.opts = self.opts.with_label(label); self }
    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self { self.opts = self.opts.with_thread_name_prefix(prefix); self }
    /// Observe `token`: once it is cancelled, runs stop dispatching and return
    /// `FanOutError::Cancelled`. Runs never cancel it themselves.
    pub fn cancel_token(mut self, token: CancelToken) -> Self { self.token = Some(token); self }

    pub fn options(&self) -> &FanOutOptions {
        &self.opts
    }

    /// Run `work(i)` for every `i` in `0..num_items` with at most `max_parallel`
    /// invocations in flight. Returns once every dispatched invocation has reported:
    /// either all succeeded, or the first error observed (in completion order).
    ///
    /// - `max_parallel == 0` is rejected before anything runs.
    /// - `num_items == 0` returns immediately without spawning anything.
    /// - `max_parallel > num_items` behaves exactly like `max_parallel == num_items`.
    ///
    /// `work` may run concurrently with itself on different threads. A panic inside
    /// `work` is caught and reported as `FanOutError::Panicked`.
    pub fn run<F>(&self, num_items: usize, work: F) -> Result<RunSummary>
    where
        F: Fn(usize) -> Result<()> + Sync,
    {
        self.run_inner(num_items, &self.run_token(), &work)
    }

    /// Like `run`, but hands each invocation a per-run cancel token so long-running
    /// work can stop early once another item has failed or the caller cancelled.
    pub fn run_with_token<F>(&self, num_items: usize, work: F) -> Result<RunSummary>
    where
        F: Fn(usize, &CancelToken) -> Result<()> + Sync,
    {
        let token = self.run_token();
        self.run_inner(num_items, &token, &|index| work(index, &token))
    }

    /// Each run gets its own token, a child of the caller's. A failure cancels only
    /// that child, so the builder and the caller's token stay reusable.
    fn run_token(&self) -> CancelToken {
        self.token.as_ref().map(CancelToken::child).unwrap_or_default()
    }

    fn run_inner<F>(&self, num_items: usize, token: &CancelToken, work: &F) -> Result<RunSummary>
    where
        F: Fn(usize) -> Result<()> + Sync,
    {
        let budget = self.validated_budget(num_items)?;
        if num_items == 0 {
            tracing::debug!("no work items; nothing to dispatch");
            return Ok(RunSummary::default());
        }
        let span = self
            .opts
            .label
            .as_deref()
            .map(|label| tracing::info_span!("fan_out", label = %label, items = num_items, max_parallel = budget).entered());
        let res = Coordinator::new(num_items, budget, &self.opts, token).run(work);
        drop(span);
        res
    }

    fn validated_budget(&self, num_items: usize) -> Result<usize, FanOutError> {
        if self.opts.max_parallel == 0 {
            return Err(FanOutError::InvalidMaxParallel(0));
        }
        Ok(self.opts.max_parallel.min(num_items))
    }
}

/// Run `work` for each index in `0..num_items`, at most `max_parallel` at a time,
/// stopping dispatch at the first error. See [`FanOut::run`].
pub fn execute<F>(num_items: usize, max_parallel: usize, work: F) -> Result<()>
where
    F: Fn(usize) -> Result<()> + Sync,
{
    FanOut::new().max_parallel(max_parallel).run(num_items, work)?;
    Ok(())
}

/// Signed variant of [`execute`] for callers holding counts as `i64` (row counts,
/// config values). Negative counts and non-positive budgets are configuration
/// errors and `work` is never invoked for them.
pub fn execute_signed<F>(num_items: i64, max_parallel: i64, work: F) -> Result<()>
where
    F: Fn(usize) -> Result<()> + Sync,
{
    if num_items < 0 {
        return Err(FanOutError::NegativeItemCount(num_items).into());
    }
    if max_parallel <= 0 {
        return Err(FanOutError::InvalidMaxParallel(max_parallel).into());
    }
    let items = usize::try_from(num_items).context("num_items does not fit in usize")?;
    // The budget is clamped to `items` anyway, so saturating is lossless here.
    let budget = usize::try_from(max_parallel).unwrap_or(usize::MAX);
    execute(items, budget, work)
}
