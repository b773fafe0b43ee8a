//! Bounded-concurrency batch executor.
//!
//! # Architecture
//!
//! ```text
//! items ──► WorkQueue (mutex-guarded cursor)
//!              │ claim()        │ claim()
//!              ▼                ▼
//!          worker 0   ...   worker k-1      k = min(limit, n)
//!              │ op(item, i)    │
//!              ▼                ▼
//!          [(i, Outcome)]   [(i, Outcome)]
//!              └──────┬─────────┘
//!                     ▼
//!            ResultSet (sorted by i)
//! ```
//!
//! Workers are plain futures joined on the caller's task, so the executor is
//! runtime-agnostic and never spawns threads. Claiming the next item is a
//! short synchronous critical section; each worker suspends only while its
//! current `op` future is pending. Outcomes are owned by the worker that
//! claimed the position until the batch settles.
//!
//! # Failure isolation
//!
//! An `op` that returns `Err` or panics settles its own position as
//! [`Outcome::Failure`]. Other positions are unaffected and [`run`] never
//! fails as a whole.
//!
//! # Deadlines
//!
//! There is no batch deadline and no cancellation. An `op` that never
//! settles keeps [`run`] pending; bound each call inside `op` (for example
//! with the per-attempt timeout of an HTTP client) or wrap the whole `run`
//! externally.

mod outcome;

pub use outcome::{ItemFailure, Outcome, ResultSet, WorkItem};

use std::any::Any;
use std::future::Future;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};

use futures_util::FutureExt;
use futures_util::future::join_all;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("concurrency limit must be at least 1")]
pub struct ZeroLimitError;

/// Number of workers a batch of `total` items runs with.
#[must_use]
pub fn effective_concurrency(limit: NonZeroUsize, total: usize) -> usize {
    limit.get().min(total)
}

/// Run `op` over every item with at most `limit` calls in flight.
///
/// `op` receives the item and its input position. The returned set has one
/// outcome per input item, in input order.
pub async fn run<I, T, R, E, F, Fut>(items: I, limit: NonZeroUsize, op: F) -> ResultSet<R, E>
where
    I: IntoIterator<Item = T>,
    F: Fn(T, usize) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    let items: Vec<T> = items.into_iter().collect();
    let total = items.len();
    if total == 0 {
        return ResultSet::empty();
    }

    let workers = effective_concurrency(limit, total);
    let queue = WorkQueue::new(items);
    let queue = &queue;
    let op = &op;

    let pool = (0..workers).map(|_| async move {
        let mut settled = Vec::new();
        while let Some(WorkItem { index, item }) = queue.claim() {
            let outcome = invoke(op, item, index).await;
            settled.push((index, outcome));
        }
        settled
    });

    let mut settled: Vec<(usize, Outcome<R, E>)> =
        join_all(pool).await.into_iter().flatten().collect();
    settled.sort_unstable_by_key(|(index, _)| *index);
    debug_assert_eq!(settled.len(), total);

    ResultSet::from_vec(settled.into_iter().map(|(_, outcome)| outcome).collect())
}

/// A concurrency limit bound once, typically from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedExecutor {
    limit: NonZeroUsize,
}

impl BoundedExecutor {
    #[must_use]
    pub const fn new(limit: NonZeroUsize) -> Self {
        Self { limit }
    }

    pub fn try_new(limit: usize) -> Result<Self, ZeroLimitError> {
        NonZeroUsize::new(limit)
            .map(Self::new)
            .ok_or(ZeroLimitError)
    }

    #[must_use]
    pub const fn limit(&self) -> NonZeroUsize {
        self.limit
    }

    pub async fn run<I, T, R, E, F, Fut>(&self, items: I, op: F) -> ResultSet<R, E>
    where
        I: IntoIterator<Item = T>,
        F: Fn(T, usize) -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        run(items, self.limit, op).await
    }
}

/// Single-owner dispatch of input positions.
struct WorkQueue<T> {
    pending: Mutex<std::iter::Enumerate<std::vec::IntoIter<T>>>,
}

impl<T> WorkQueue<T> {
    fn new(items: Vec<T>) -> Self {
        Self {
            pending: Mutex::new(items.into_iter().enumerate()),
        }
    }

    fn claim(&self) -> Option<WorkItem<T>> {
        // The lock is never held across an await or around `op`, so poisoning
        // cannot leave the cursor in a torn state.
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.next().map(|(index, item)| WorkItem { index, item })
    }
}

async fn invoke<T, R, E, F, Fut>(op: &F, item: T, index: usize) -> Outcome<R, E>
where
    F: Fn(T, usize) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    let future = match panic::catch_unwind(AssertUnwindSafe(|| op(item, index))) {
        Ok(future) => future,
        Err(payload) => return Outcome::Failure(ItemFailure::Panicked(panic_message(&*payload))),
    };

    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(Ok(value)) => Outcome::Success(value),
        Ok(Err(err)) => Outcome::Failure(ItemFailure::Failed(err)),
        Err(payload) => Outcome::Failure(ItemFailure::Panicked(panic_message(&*payload))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
