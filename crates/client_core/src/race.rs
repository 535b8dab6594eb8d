//! Earliest-of {operation, timer} without cancelling the operation.

use std::{future::Future, time::Duration};

use tokio::task::JoinError;

#[derive(Debug)]
pub enum Race<T> {
    /// The operation settled inside the budget.
    Completed(T),
    /// The budget elapsed first. The operation keeps running on its own task.
    TimedOut,
    /// The operation task panicked before the budget elapsed.
    Aborted(JoinError),
}

/// Runs `operation` on a detached task and waits at most `budget` for it.
///
/// Losing the race drops only the join handle, so the operation still runs
/// to completion in the background and its output is discarded.
pub async fn race_with_timeout<F>(operation: F, budget: Duration) -> Race<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let handle = tokio::spawn(operation);
    match tokio::time::timeout(budget, handle).await {
        Ok(Ok(output)) => Race::Completed(output),
        Ok(Err(join_error)) => Race::Aborted(join_error),
        Err(_) => Race::TimedOut,
    }
}
