//! In-order iteration on the caller's thread, for callers that do not need concurrency.

use anyhow::{Context, Result};

/// Call `f` on each item in order, stopping at the first error.
pub fn for_each_sequential<T, F>(items: &[T], mut f: F) -> Result<()>
where
    F: FnMut(&T) -> Result<()>,
{
    for_each_sequential_indexed(items, |item, _| f(item))
}

/// Like [`for_each_sequential`], but also passes the item's position.
pub fn for_each_sequential_indexed<T, F>(items: &[T], mut f: F) -> Result<()>
where
    F: FnMut(&T, usize) -> Result<()>,
{
    for (i, item) in items.iter().enumerate() {
        f(item, i).with_context(|| format!("item {i} failed"))?;
    }
    Ok(())
}
