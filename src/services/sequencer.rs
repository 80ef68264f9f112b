//! Bounded sequencer: runs asynchronous work over a list of items with a
//! maximum number in flight.
//!
//! Guarantees:
//! - at most `max_concurrency` invocations of `work` are pending at once, and
//!   a new item starts as soon as any in-flight item settles;
//! - outcomes are reported in input order, whatever the completion order;
//! - a failing item does not stop the others; the aggregate still fails once
//!   everything has settled;
//! - a cancelled token stops further items from starting, while items already
//!   in flight run to completion;
//! - dispatch is a loop over a `FuturesUnordered` set, so arbitrarily long
//!   inputs never grow the stack.
//!
//! Items are polled on the caller's task. Nothing is spawned, so `work` may
//! borrow from its environment.

use std::fmt;
use std::future::Future;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::types::errors::SyncError;

/// Why a sequenced run did not produce a full list of results.
#[derive(Debug)]
pub enum SequenceError<R, E> {
    /// The token was cancelled before every item started. `settled` holds the
    /// outcome of each item that ran, in input order; `None` marks items that
    /// never started.
    Cancelled { settled: Vec<Option<Result<R, E>>> },
    /// At least one item failed. `outcomes` holds every item's outcome in
    /// input order.
    Failed { outcomes: Vec<Result<R, E>> },
}

impl<R, E> SequenceError<R, E> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SequenceError::Cancelled { .. })
    }

    /// Index of the first failed item, if any item failed.
    pub fn first_failure_index(&self) -> Option<usize> {
        match self {
            SequenceError::Failed { outcomes } => outcomes.iter().position(Result::is_err),
            SequenceError::Cancelled { settled } => settled
                .iter()
                .position(|o| matches!(o, Some(Err(_)))),
        }
    }

    /// Consumes the error, returning the first item failure in input order.
    pub fn into_first_failure(self) -> Option<E> {
        match self {
            SequenceError::Failed { outcomes } => outcomes.into_iter().find_map(Result::err),
            SequenceError::Cancelled { settled } => settled
                .into_iter()
                .flatten()
                .find_map(Result::err),
        }
    }
}

impl<R, E: fmt::Display> fmt::Display for SequenceError<R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceError::Cancelled { settled } => {
                let ran = settled.iter().filter(|o| o.is_some()).count();
                write!(f, "Sequence cancelled after {} of {} items", ran, settled.len())
            }
            SequenceError::Failed { outcomes } => {
                let failed = outcomes.iter().filter(|o| o.is_err()).count();
                match outcomes.iter().find_map(|o| o.as_ref().err()) {
                    Some(first) => write!(
                        f,
                        "{} of {} items failed, first: {}",
                        failed,
                        outcomes.len(),
                        first
                    ),
                    None => write!(f, "{} of {} items failed", failed, outcomes.len()),
                }
            }
        }
    }
}

impl<R: fmt::Debug, E: fmt::Debug + fmt::Display> std::error::Error for SequenceError<R, E> {}

/// Cancellation wins over item failures; otherwise the first failure in
/// input order is surfaced.
impl<R> From<SequenceError<R, SyncError>> for SyncError {
    fn from(err: SequenceError<R, SyncError>) -> Self {
        if err.is_cancelled() {
            return SyncError::Cancelled;
        }
        err.into_first_failure().unwrap_or(SyncError::Cancelled)
    }
}

/// Runs `work` over `items` with at most `max_concurrency` items in flight.
///
/// `work` receives each item with its input index. A `max_concurrency` of
/// zero is treated as one.
///
/// # Errors
/// Returns [`SequenceError::Cancelled`] if `cancellation` fired before every
/// item started, or [`SequenceError::Failed`] if any item failed.
pub async fn run<T, R, E, F, Fut>(
    items: impl IntoIterator<Item = T>,
    mut work: F,
    max_concurrency: usize,
    cancellation: Option<&CancellationToken>,
) -> Result<Vec<R>, SequenceError<R, E>>
where
    F: FnMut(T, usize) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    let limit = max_concurrency.max(1);
    let mut pending = items.into_iter().enumerate();
    let mut slots: Vec<Option<Result<R, E>>> = Vec::new();
    let mut in_flight = FuturesUnordered::new();
    let mut cancelled = false;
    let mut exhausted = false;

    loop {
        while !cancelled && !exhausted && in_flight.len() < limit {
            if cancellation.is_some_and(|token| token.is_cancelled()) {
                cancelled = true;
                break;
            }

            match pending.next() {
                Some((index, item)) => {
                    if slots.len() <= index {
                        slots.resize_with(index + 1, || None);
                    }
                    let fut = work(item, index);
                    in_flight.push(async move { (index, fut.await) });
                }
                None => exhausted = true,
            }
        }

        match in_flight.next().await {
            Some((index, outcome)) => slots[index] = Some(outcome),
            None => break,
        }
    }

    if cancelled {
        // Items that never started still count towards the input length.
        slots.extend(pending.map(|_| None));
        return Err(SequenceError::Cancelled { settled: slots });
    }

    let outcomes: Vec<Result<R, E>> = slots.into_iter().flatten().collect();
    if outcomes.iter().any(Result::is_err) {
        return Err(SequenceError::Failed { outcomes });
    }

    Ok(outcomes.into_iter().filter_map(Result::ok).collect())
}
