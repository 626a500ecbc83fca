//! Bounded write batching.
//!
//! Updates are issued in groups whose members run concurrently; groups run
//! one after another. Creates go out as sequential bulk calls.

use std::future::Future;

use futures::future::join_all;

use crate::error::WriteError;

/// Concurrent updates per group.
pub const DEFAULT_UPDATE_GROUP_SIZE: usize = 10;

/// Records per bulk-create call.
pub const DEFAULT_CREATE_BATCH_SIZE: usize = 50;

/// Write batching parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    pub update_group_size: usize,
    pub create_batch_size: usize,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            update_group_size: DEFAULT_UPDATE_GROUP_SIZE,
            create_batch_size: DEFAULT_CREATE_BATCH_SIZE,
        }
    }
}

/// Outcome of a write phase. Failures are accumulated rather than raised.
#[derive(Debug, Clone, Default)]
pub struct BatchTally {
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<WriteError>,
}

impl BatchTally {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    /// Records `count` failed records sharing one cause.
    pub fn record_failure(&mut self, count: usize, error: WriteError) {
        self.failed += count;
        self.failures.push(error);
    }

    pub fn merge(&mut self, other: BatchTally) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.failures.extend(other.failures);
    }
}

/// Runs `write` over `items` in sequential groups of at most `group_size`,
/// awaiting each group concurrently. Results keep input order.
pub async fn run_in_groups<P, T, Fut, W>(items: Vec<P>, group_size: usize, write: W) -> Vec<T>
where
    W: Fn(P) -> Fut,
    Fut: Future<Output = T>,
{
    let group_size = group_size.max(1);
    let mut results = Vec::with_capacity(items.len());
    let mut remaining = items.into_iter();

    loop {
        let group: Vec<Fut> = remaining.by_ref().take(group_size).map(&write).collect();
        if group.is_empty() {
            break;
        }
        results.extend(join_all(group).await);
    }

    results
}

/// Splits `items` into owned chunks of at most `size`.
#[must_use]
pub fn chunked<T>(items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let size = size.max(1);
    let mut chunks = Vec::with_capacity(items.len().div_ceil(size));
    let mut remaining = items.into_iter().peekable();
    while remaining.peek().is_some() {
        chunks.push(remaining.by_ref().take(size).collect());
    }
    chunks
}
