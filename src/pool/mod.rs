//! Bounded worker pool
//!
//! A fixed number of admission slots plus a completion barrier. `submit`
//! blocks the caller while every slot is taken, so there is never an
//! unbounded queue of pending work. Tasks run on their own OS thread and own
//! their failures: a panic is caught, logged and counted, and never keeps
//! `wait` from returning.
//!
//! One pool serves one batch. Callers that need independent "all done"
//! signals construct one pool each.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use tracing::{debug, error};

#[derive(Debug, Default)]
struct Slots {
    in_flight: usize,
    peak_in_flight: usize,
    submitted: usize,
    completed: usize,
    panicked: usize,
}

#[derive(Debug, Default)]
struct Shared {
    slots: Mutex<Slots>,
    changed: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases a slot when the task finishes, however it finishes
struct SlotGuard {
    shared: Arc<Shared>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let mut slots = self.shared.lock();
        slots.in_flight -= 1;
        slots.completed += 1;
        drop(slots);
        self.shared.changed.notify_all();
    }
}

/// Snapshot of pool counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub submitted: usize,
    pub completed: usize,
    pub panicked: usize,
    pub peak_in_flight: usize,
}

/// Fixed-capacity task executor with a join barrier
pub struct WorkerPool {
    max_workers: usize,
    shared: Arc<Shared>,
}

impl WorkerPool {
    /// Create a pool admitting at most `max_workers` concurrent tasks
    ///
    /// Zero means "use the host's available parallelism".
    pub fn new(max_workers: usize) -> Self {
        let max_workers = if max_workers == 0 {
            default_workers()
        } else {
            max_workers
        };

        Self {
            max_workers,
            shared: Arc::new(Shared::default()),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Start `task` on a worker thread, blocking until a slot is free
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut slots = self.shared.lock();
            while slots.in_flight >= self.max_workers {
                slots = self
                    .shared
                    .changed
                    .wait(slots)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            slots.in_flight += 1;
            slots.submitted += 1;
            slots.peak_in_flight = slots.peak_in_flight.max(slots.in_flight);
        }

        let guard = SlotGuard {
            shared: Arc::clone(&self.shared),
        };

        let spawned = thread::Builder::new()
            .name("listinsight-worker".to_string())
            .spawn(move || {
                let guard = guard;
                if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                    error!("Worker task panicked; continuing with remaining tasks");
                    guard.shared.lock().panicked += 1;
                }
            });

        // On spawn failure the closure (and its guard) is dropped, which
        // frees the slot again.
        if let Err(e) = spawned {
            error!("Failed to spawn worker thread, task skipped: {}", e);
        }
    }

    /// Block until every submitted task has completed
    pub fn wait(&self) {
        let mut slots = self.shared.lock();
        while slots.in_flight > 0 {
            slots = self
                .shared
                .changed
                .wait(slots)
                .unwrap_or_else(PoisonError::into_inner);
        }
        debug!(
            "Worker pool drained: {} completed, {} panicked, peak {} of {}",
            slots.completed, slots.panicked, slots.peak_in_flight, self.max_workers
        );
    }

    pub fn stats(&self) -> PoolStats {
        let slots = self.shared.lock();
        PoolStats {
            submitted: slots.submitted,
            completed: slots.completed,
            panicked: slots.panicked,
            peak_in_flight: slots.peak_in_flight,
        }
    }
}

/// Host available parallelism, falling back to a single worker
pub fn default_workers() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
