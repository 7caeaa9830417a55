//! Bounded worker pool with ordered result collection
//!
//! Part-upload tasks run on this pool with a fixed concurrency limit and a
//! bounded submission queue. Submission waits when the queue is full
//! (backpressure) instead of failing or dropping work. Each submitted task
//! yields a [`TaskHandle`]; awaiting handles in submission order gives the
//! ordered collection the upload coordinator needs, regardless of which
//! worker finished first. Task failures travel through the handle as plain
//! `Result` values rather than crossing the task boundary as panics.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};

/// Handle to one submitted task; awaiting it yields the task's result
#[derive(Debug)]
pub struct TaskHandle<T> {
    inner: JoinHandle<Result<T>>,
}

impl<T> TaskHandle<T> {
    /// Wait for the task and return its result.
    ///
    /// A panicked or cancelled task surfaces as [`Error::TaskJoin`].
    pub async fn join(self) -> Result<T> {
        match self.inner.await {
            Ok(result) => result,
            Err(e) => Err(Error::TaskJoin(e.to_string())),
        }
    }
}

/// Fixed-concurrency task pool with bounded submission
#[derive(Debug)]
pub struct TaskPool {
    /// Caps tasks admitted but not yet finished: workers + queue depth.
    /// Acquired at submission, so a full queue blocks the submitter.
    slots: Arc<Semaphore>,
    /// Caps tasks actually running.
    workers: Arc<Semaphore>,
}

impl TaskPool {
    /// Pool running at most `workers` tasks with `max_queued` waiting.
    pub fn new(workers: usize, max_queued: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(workers + max_queued)),
            workers: Arc::new(Semaphore::new(workers)),
        }
    }

    /// Submit a task, waiting while the queue is full.
    ///
    /// The future starts running once a worker frees up; its slot is held
    /// until it finishes so queued-plus-running work stays bounded.
    pub async fn submit<T, F>(&self, task: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        // Neither semaphore is ever closed, so acquisition cannot fail.
        let slot = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .expect("pool slot semaphore closed");
        let workers = self.workers.clone();

        let inner = tokio::spawn(async move {
            let _worker = workers
                .acquire_owned()
                .await
                .expect("pool worker semaphore closed");
            let result = task.await;
            drop(slot);
            result
        });

        TaskHandle { inner }
    }
}

/// Initialize-once holder for the pool shared by all sessions of a handle
///
/// The pool is constructed on the first flip of any write session and
/// released exactly once when the handle closes.
#[derive(Debug)]
pub struct LazyPool {
    workers: usize,
    max_queued: usize,
    cell: std::sync::Mutex<Option<Arc<TaskPool>>>,
}

impl LazyPool {
    pub fn new(workers: usize, max_queued: usize) -> Self {
        Self {
            workers,
            max_queued,
            cell: std::sync::Mutex::new(None),
        }
    }

    /// The shared pool, constructing it on first use.
    pub fn get(&self) -> Arc<TaskPool> {
        let mut cell = self
            .cell
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        cell.get_or_insert_with(|| Arc::new(TaskPool::new(self.workers, self.max_queued)))
            .clone()
    }

    /// Release the pool if it was ever created. Safe to call repeatedly.
    pub fn release(&self) -> bool {
        let mut cell = self
            .cell
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        cell.take().is_some()
    }

    /// True once `get` has run and `release` has not.
    pub fn is_initialized(&self) -> bool {
        self.cell
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_lazy_pool_initializes_once_and_releases_once() {
        let lazy = LazyPool::new(2, 2);
        assert!(!lazy.is_initialized());

        let a = lazy.get();
        let b = lazy.get();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(lazy.is_initialized());

        assert!(lazy.release());
        assert!(!lazy.release());
        assert!(!lazy.is_initialized());
    }

    #[tokio::test]
    async fn test_results_in_submission_order() {
        let pool = TaskPool::new(4, 4);
        let mut handles = Vec::new();

        // Later tasks finish earlier, results must still come back in
        // submission order.
        for i in 0..8u64 {
            let handle = pool
                .submit(async move {
                    tokio::time::sleep(Duration::from_millis(80 - i * 10)).await;
                    Ok(i)
                })
                .await;
            handles.push(handle);
        }

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.join().await.unwrap());
        }
        assert_eq!(results, (0..8).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_concurrency_is_capped() {
        let pool = TaskPool::new(2, 8);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let running = running.clone();
            let peak = peak.clone();
            let handle = pool
                .submit(async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
                .await;
            handles.push(handle);
        }
        for handle in handles {
            handle.join().await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_submission_blocks_when_queue_full() {
        let pool = Arc::new(TaskPool::new(1, 1));
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        // Occupy the single worker.
        let blocker = pool
            .submit(async move {
                let _ = release_rx.await;
                Ok(())
            })
            .await;
        // Fill the single queue slot.
        let queued = pool.submit(async { Ok(()) }).await;

        // A third submission must not complete until the worker frees up.
        let pool2 = pool.clone();
        let third = tokio::spawn(async move { pool2.submit(async { Ok(1u32) }).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!third.is_finished(), "submit should block on a full queue");

        release_tx.send(()).unwrap();
        blocker.join().await.unwrap();
        queued.join().await.unwrap();
        let handle = third.await.unwrap();
        assert_eq!(handle.join().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failure_surfaces_to_collector() {
        let pool = TaskPool::new(2, 2);
        let ok = pool.submit(async { Ok(1u32) }).await;
        let bad = pool
            .submit(async { Err::<u32, _>(Error::Network("part 2 refused".to_string())) })
            .await;

        assert_eq!(ok.join().await.unwrap(), 1);
        let err = bad.join().await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
        assert!(err.to_string().contains("part 2 refused"));
    }

    #[tokio::test]
    async fn test_panic_becomes_task_join_error() {
        let pool = TaskPool::new(1, 1);
        let handle = pool
            .submit(async {
                panic!("worker blew up");
                #[allow(unreachable_code)]
                Ok(())
            })
            .await;
        let err = handle.join().await.unwrap_err();
        assert!(matches!(err, Error::TaskJoin(_)));
    }
}
