//! Background fetch worker
//!
//! One producer/consumer thread per engine. Callers enqueue prefetch
//! requests from any thread; the worker services them in FIFO order,
//! running the fetch callback outside any lock, and parks completed entries
//! on a ready queue for the engine to drain. Stopping is cooperative: the
//! flag is checked before every dequeue and after every wakeup, and an
//! in-flight fetch is never interrupted.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use outcore_chunk::BlockDescriptor;
use outcore_mem::CacheEntry;

use crate::error::EngineResult;

/// One queued fetch: which block, and what shape to transfer
#[derive(Debug, Clone)]
pub struct PrefetchRequest {
    /// Block identity
    pub key: String,
    /// Shape of the block being fetched
    pub descriptor: BlockDescriptor,
}

/// Fetch callback run by the worker for every request
///
/// Implementations typically capture a chunk store handle and resolve the
/// request's block to a physical offset and chunk shape.
pub type FetchFn = Arc<dyn Fn(&PrefetchRequest) -> EngineResult<Vec<f64>> + Send + Sync>;

/// Worker counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IoStats {
    /// Fetches completed successfully
    pub fetched: u64,
    /// Fetches that failed (isolated per block, never retried here)
    pub failed: u64,
}

struct WorkerState {
    queue: VecDeque<PrefetchRequest>,
    ready: VecDeque<CacheEntry>,
}

struct Shared {
    state: Mutex<WorkerState>,
    work_cv: Condvar,
    ready_cv: Condvar,
    stopped: AtomicBool,
    fetched: AtomicU64,
    failed: AtomicU64,
}

/// Handle to the background fetch worker
pub struct IoThread {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl IoThread {
    /// Start the worker with the given fetch callback
    pub fn spawn(fetch: FetchFn) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(WorkerState {
                queue: VecDeque::new(),
                ready: VecDeque::new(),
            }),
            work_cv: Condvar::new(),
            ready_cv: Condvar::new(),
            stopped: AtomicBool::new(false),
            fetched: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        });

        let worker_shared = shared.clone();
        let handle = std::thread::Builder::new()
            .name("outcore-io".to_string())
            .spawn(move || worker_loop(worker_shared, fetch))
            .expect("failed to spawn io worker thread");

        Self {
            shared,
            worker: Mutex::new(Some(handle)),
        }
    }

    /// Queue one fetch request and wake the worker
    ///
    /// Safe from any thread. Requests arriving after [`stop`](Self::stop)
    /// are dropped: accepting them would break the guarantee that no
    /// callback runs once `stop` has returned.
    pub fn enqueue(&self, request: PrefetchRequest) {
        if self.shared.stopped.load(Ordering::Acquire) {
            debug!(key = %request.key, "dropping request enqueued after stop");
            return;
        }
        let mut state = self.shared.state.lock();
        state.queue.push_back(request);
        drop(state);
        self.shared.work_cv.notify_one();
    }

    /// Pop one completed fetch if any is ready, without blocking
    pub fn pop_ready(&self) -> Option<CacheEntry> {
        self.shared.state.lock().ready.pop_front()
    }

    /// Wait up to `timeout` for a completed fetch
    ///
    /// Returns `None` on timeout or when the worker has been stopped with
    /// nothing ready.
    pub fn wait_ready(&self, timeout: Duration) -> Option<CacheEntry> {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        loop {
            if let Some(entry) = state.ready.pop_front() {
                return Some(entry);
            }
            if self.shared.stopped.load(Ordering::Acquire) {
                return None;
            }
            if self.shared.ready_cv.wait_until(&mut state, deadline).timed_out() {
                return state.ready.pop_front();
            }
        }
    }

    /// Number of requests queued but not yet picked up
    pub fn pending(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// Worker counters
    pub fn stats(&self) -> IoStats {
        IoStats {
            fetched: self.shared.fetched.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
        }
    }

    /// Stop the worker and wait for it to exit
    ///
    /// Idempotent and safe to race: every caller returns only after the
    /// worker has fully exited, and no fetch callback runs after any call
    /// returns. An in-flight callback is allowed to finish first.
    pub fn stop(&self) {
        if self
            .shared
            .stopped
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            // The worker checks the flag under the state lock; hold it so
            // the notify cannot land between that check and its wait.
            let _state = self.shared.state.lock();
            self.shared.work_cv.notify_all();
            self.shared.ready_cv.notify_all();
        }

        // Losers of the race block here until the winner's join completes.
        let mut worker = self.worker.lock();
        if let Some(handle) = worker.take() {
            if handle.join().is_err() {
                warn!("io worker panicked");
            }
        }
    }
}

impl Drop for IoThread {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(shared: Arc<Shared>, fetch: FetchFn) {
    loop {
        let request = {
            let mut state = shared.state.lock();
            loop {
                if shared.stopped.load(Ordering::Acquire) {
                    return;
                }
                if let Some(request) = state.queue.pop_front() {
                    break request;
                }
                shared.work_cv.wait(&mut state);
            }
        };

        debug!(key = %request.key, "fetching block");
        match fetch(&request) {
            Ok(data) => {
                shared.fetched.fetch_add(1, Ordering::Relaxed);
                let mut state = shared.state.lock();
                state.ready.push_back(CacheEntry {
                    key: request.key,
                    data,
                });
                drop(state);
                shared.ready_cv.notify_one();
            }
            Err(err) => {
                shared.failed.fetch_add(1, Ordering::Relaxed);
                warn!(key = %request.key, error = %err, "fetch failed");
            }
        }
    }
}
