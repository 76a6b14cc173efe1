//! Reusable worker threads for time-limited attempts.
//!
//! The pool behaves like a cached thread pool with an explicit ceiling:
//! idle workers are reused, new workers are spawned only while fewer than
//! `max_workers` exist, further jobs queue, and a worker that stays idle for
//! `keep_alive` exits.

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::error::BuildError;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Default upper bound on worker threads.
pub const DEFAULT_MAX_WORKERS: usize = 64;

/// Default idle period after which a worker exits.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(60);

/// A shared handle to a set of reusable worker threads.
///
/// Cloning the handle shares the same workers.
///
/// # Examples
///
/// ```rust
/// use undertow::WorkerPool;
/// use std::sync::mpsc;
/// use std::time::Duration;
///
/// let pool = WorkerPool::with_limits(4, Duration::from_secs(5)).unwrap();
/// let (tx, rx) = mpsc::channel();
/// pool.execute(move || tx.send(21 * 2).unwrap()).unwrap();
/// assert_eq!(rx.recv().unwrap(), 42);
/// ```
#[derive(Clone)]
pub struct WorkerPool {
    shared: Arc<Shared>,
}

struct Shared {
    state: Mutex<State>,
    job_available: Condvar,
    max_workers: usize,
    keep_alive: Duration,
}

#[derive(Default)]
struct State {
    queue: VecDeque<Job>,
    workers: usize,
    idle: usize,
    spawned: u64,
}

impl WorkerPool {
    /// Create a pool with explicit sizing.
    ///
    /// Fails if `max_workers` is zero.
    pub fn with_limits(max_workers: usize, keep_alive: Duration) -> Result<Self, BuildError> {
        if max_workers == 0 {
            return Err(BuildError::invalid("max_workers must be at least 1"));
        }
        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                job_available: Condvar::new(),
                max_workers,
                keep_alive,
            }),
        })
    }

    /// The process-wide pool used by [`FixedTimeLimit::new`](crate::FixedTimeLimit::new).
    ///
    /// Sized with [`DEFAULT_MAX_WORKERS`] and [`DEFAULT_KEEP_ALIVE`].
    pub fn shared() -> &'static WorkerPool {
        static SHARED: OnceLock<WorkerPool> = OnceLock::new();
        SHARED.get_or_init(WorkerPool::default)
    }

    /// Run `job` on a pooled worker.
    ///
    /// Reuses an idle worker when one is waiting, otherwise spawns one if
    /// the ceiling allows, otherwise queues. Fails only if the OS refuses to
    /// spawn a thread while the pool has no workers at all.
    pub fn execute<F>(&self, job: F) -> io::Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.shared.state.lock();
        state.queue.push_back(Box::new(job));

        if state.idle >= state.queue.len() {
            self.shared.job_available.notify_one();
            return Ok(());
        }
        if state.workers >= self.shared.max_workers {
            // Idle workers (if any) are notified; the rest wait for a free worker.
            self.shared.job_available.notify_one();
            return Ok(());
        }

        match self.spawn_worker(&mut state) {
            Ok(()) => Ok(()),
            Err(e) if state.workers == 0 => {
                state.queue.pop_back();
                Err(e)
            }
            // Existing workers will drain the queue.
            Err(_) => Ok(()),
        }
    }

    /// Number of live worker threads.
    pub fn worker_count(&self) -> usize {
        self.shared.state.lock().workers
    }

    /// Number of workers currently waiting for a job.
    pub fn idle_count(&self) -> usize {
        self.shared.state.lock().idle
    }

    /// Upper bound on worker threads.
    pub fn max_workers(&self) -> usize {
        self.shared.max_workers
    }

    /// Idle period after which a worker exits.
    pub fn keep_alive(&self) -> Duration {
        self.shared.keep_alive
    }

    fn spawn_worker(&self, state: &mut MutexGuard<'_, State>) -> io::Result<()> {
        state.spawned += 1;
        let name = format!("undertow-worker-{}", state.spawned);
        let shared = Arc::clone(&self.shared);
        thread::Builder::new()
            .name(name)
            .spawn(move || worker_loop(shared))?;
        state.workers += 1;

        #[cfg(feature = "tracing")]
        tracing::trace!(workers = state.workers, "spawned retry worker");

        Ok(())
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                job_available: Condvar::new(),
                max_workers: DEFAULT_MAX_WORKERS,
                keep_alive: DEFAULT_KEEP_ALIVE,
            }),
        }
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("WorkerPool")
            .field("max_workers", &self.shared.max_workers)
            .field("keep_alive", &self.shared.keep_alive)
            .field("workers", &state.workers)
            .field("idle", &state.idle)
            .field("queued", &state.queue.len())
            .finish()
    }
}

fn worker_loop(shared: Arc<Shared>) {
    let mut state = shared.state.lock();
    loop {
        if let Some(job) = state.queue.pop_front() {
            // A panicking job only loses its own result channel.
            MutexGuard::unlocked(&mut state, || {
                let _ = panic::catch_unwind(AssertUnwindSafe(job));
            });
            continue;
        }

        state.idle += 1;
        let timed_out = shared
            .job_available
            .wait_for(&mut state, shared.keep_alive)
            .timed_out();
        state.idle -= 1;

        if timed_out && state.queue.is_empty() {
            state.workers -= 1;

            #[cfg(feature = "tracing")]
            tracing::trace!(workers = state.workers, "reclaimed idle retry worker");

            return;
        }
    }
}
