//! Task combinators
//!
//! A [`Task`] is a boxed, not-yet-polled future producing exactly one value
//! or failing. Nothing runs until the task is awaited (or spawned), so lists
//! of tasks can be built up front and handed to a combinator that decides
//! ordering and concurrency.

use crate::error::{WorkerError, WorkerResult};
use futures_util::future::{self, BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Deferred unit of asynchronous work
pub type Task<T> = BoxFuture<'static, WorkerResult<T>>;

/// Deferred candidate producer: calling it yields a task that may resolve to
/// nothing
pub type Candidate<T> = Box<dyn FnOnce() -> Task<Option<T>> + Send>;

/// A task whose result is computed once and shared by every awaiting clone
pub type SharedTask<T> = Shared<BoxFuture<'static, Result<T, Arc<WorkerError>>>>;

/// Box a future as a task
pub fn task<T, F>(fut: F) -> Task<T>
where
    F: Future<Output = WorkerResult<T>> + Send + 'static,
{
    Box::pin(fut)
}

/// Task resolving immediately to `value`
pub fn ready<T: Send + 'static>(value: T) -> Task<T> {
    Box::pin(future::ready(Ok(value)))
}

/// Run tasks one after another, stopping at the first failure.
/// Results keep the input order.
pub fn sequence<T: Send + 'static>(tasks: Vec<Task<T>>) -> Task<Vec<T>> {
    Box::pin(async move {
        let mut results = Vec::with_capacity(tasks.len());
        for task in tasks {
            results.push(task.await?);
        }
        Ok(results)
    })
}

/// Run tasks concurrently and wait for all of them.
///
/// Fails with the first error observed; the outcome of the remaining tasks
/// is not reported.
pub fn parallel<T: Send + 'static>(tasks: Vec<Task<T>>) -> Task<Vec<T>> {
    Box::pin(future::try_join_all(tasks))
}

/// Evaluate candidates in declared order and resolve to the first present
/// value. Order decides the winner, not speed: a later candidate is only
/// started once every earlier one came back empty.
pub fn first_non_empty<T: Send + 'static>(candidates: Vec<Candidate<T>>) -> Task<Option<T>> {
    Box::pin(async move {
        for candidate in candidates {
            if let Some(value) = candidate().await? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    })
}

/// Resolve to `fallback` if `task` has not produced a value within `limit`.
///
/// The task runs on its own tokio task, so a late finisher is not cancelled;
/// it completes in the background and its result is dropped.
pub fn race_with_timeout<T: Send + 'static>(task: Task<T>, limit: Duration, fallback: T) -> Task<T> {
    Box::pin(async move {
        let handle = tokio::spawn(task);
        match tokio::time::timeout(limit, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(WorkerError::Internal(format!("task aborted: {}", e))),
            Err(_) => {
                debug!("Task exceeded {:?}, using fallback", limit);
                Ok(fallback)
            }
        }
    })
}

/// Share one execution of `task` between several consumers
pub fn memoize<T: Clone + Send + Sync + 'static>(task: Task<T>) -> SharedTask<T> {
    task.map(|result| result.map_err(Arc::new)).boxed().shared()
}

/// Await a clone of a shared task as an ordinary task
pub fn fork<T: Clone + Send + Sync + 'static>(shared: &SharedTask<T>) -> Task<T> {
    let shared = shared.clone();
    Box::pin(async move { shared.await.map_err(WorkerError::Shared) })
}

/// Run a task for its side effects only
pub fn discard<T: Send + 'static>(task: Task<T>) -> Task<()> {
    Box::pin(async move { task.await.map(|_| ()) })
}

/// Spawn a task detached, logging (not propagating) its failure
pub fn spawn_detached(label: &'static str, task: Task<()>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = task.await {
            warn!("Background {} failed: {}", label, e);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn candidate<T: Send + 'static>(value: Option<T>) -> Candidate<T> {
        Box::new(move || ready(value))
    }

    #[tokio::test]
    async fn sequence_preserves_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let tasks: Vec<Task<u32>> = (0..3)
            .map(|i| {
                let log = Arc::clone(&log);
                task(async move {
                    log.lock().unwrap().push(i);
                    Ok(i * 10)
                })
            })
            .collect();

        assert_eq!(sequence(tasks).await.unwrap(), vec![0, 10, 20]);
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn sequence_stops_at_first_failure() {
        let ran = Arc::new(AtomicUsize::new(0));
        let after = Arc::clone(&ran);
        let tasks: Vec<Task<()>> = vec![
            task(async { Err(WorkerError::Internal("boom".into())) }),
            task(async move {
                after.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        ];

        assert!(sequence(tasks).await.is_err());
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn parallel_collects_all_in_order() {
        let tasks: Vec<Task<u64>> = vec![
            task(async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(1)
            }),
            ready(2),
        ];
        assert_eq!(parallel(tasks).await.unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn parallel_fails_if_any_fails() {
        let tasks: Vec<Task<u64>> = vec![ready(1), task(async { Err(WorkerError::Internal("x".into())) })];
        assert!(parallel(tasks).await.is_err());
    }

    #[tokio::test]
    async fn first_non_empty_prefers_declared_order() {
        let slow_first: Candidate<&str> = Box::new(|| {
            task(async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(Some("slow"))
            })
        });
        let found = first_non_empty(vec![candidate(None), slow_first, candidate(Some("fast"))])
            .await
            .unwrap();
        assert_eq!(found, Some("slow"));
    }

    #[tokio::test]
    async fn first_non_empty_skips_later_candidates() {
        let started = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&started);
        let later: Candidate<u8> = Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            ready(Some(2))
        });

        let found = first_non_empty(vec![candidate(Some(1)), later]).await.unwrap();
        assert_eq!(found, Some(1));
        assert_eq!(started.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn first_non_empty_all_empty() {
        let found = first_non_empty::<u8>(vec![candidate(None), candidate(None)])
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn race_with_timeout_uses_fallback() {
        let never: Task<&str> = task(future::pending());
        let started = std::time::Instant::now();
        let value = race_with_timeout(never, Duration::from_millis(10), "fallback")
            .await
            .unwrap();
        assert_eq!(value, "fallback");
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn race_with_timeout_lets_loser_finish() {
        let finished = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&finished);
        let slow: Task<u8> = task(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            flag.fetch_add(1, Ordering::SeqCst);
            Ok(1)
        });

        let value = race_with_timeout(slow, Duration::from_millis(5), 0).await.unwrap();
        assert_eq!(value, 0);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn memoize_runs_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let shared = memoize(task(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(42u32)
        }));

        assert_eq!(fork(&shared).await.unwrap(), 42);
        assert_eq!(fork(&shared).await.unwrap(), 42);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn memoize_shares_failure() {
        let shared = memoize::<u8>(task(async { Err(WorkerError::network("/x", "down")) }));
        let err = fork(&shared).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
