//! Slice adapters over the fan-out executor.

use crate::executor::execute;
use crate::sequential::for_each_sequential;
use anyhow::Result;

/// Limit parallelism across `items`: at most `limit` calls of `f` in flight.
/// `limit <= 1` runs in order on the caller's thread.
pub fn for_each_limited<T, F>(items: &[T], limit: usize, f: F) -> Result<()>
where
    T: Sync,
    F: Sync + Fn(&T) -> Result<()>,
{
    if limit <= 1 {
        return for_each_sequential(items, f);
    }
    execute(items.len(), limit, |i| f(&items[i]))
}
