//! Bounded-concurrency task pool.
//!
//! # CHANGELOG (recent first, max 5 entries)
//! 07/18/2026 - Initial implementation (Claude)

use anyhow::Result;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::future::Future;

/// Run `tasks` with at most `limit` in flight.
///
/// Results come back indexed by submission order. The first task error drops
/// every remaining future (in-flight ones are cancelled at their next await
/// point) and surfaces the error. No task is ever started twice.
pub async fn run_pool<T, F>(tasks: Vec<F>, limit: usize) -> Result<Vec<T>>
where
    F: Future<Output = Result<T>>,
{
    if tasks.is_empty() {
        return Ok(Vec::new());
    }
    let limit = limit.max(1);
    stream::iter(tasks).buffered(limit).try_collect().await
}
