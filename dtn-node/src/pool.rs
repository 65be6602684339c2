//! Bounded queue and worker thread pool.
//!
//! A `ThreadQueue` is a fixed-capacity ring guarded by a `ThreadLock`;
//! producers push, pool workers drain. Each worker pass holds the queue
//! lock only long enough to pop one element and runs the processing
//! callback outside it, so a slow callback in one worker never stalls the
//! others.
//!
//! Pool lifecycle: STOPPED → RUNNING → TO_STOP → STOPPED. Stopping lets
//! every worker finish its in-flight element; whatever is still queued
//! stays in the queue and belongs to the caller.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::lock::ThreadLock;

/// Fixed-capacity FIFO ring.
pub struct Ring<T> {
    buf: VecDeque<T>,
    capacity: usize,
}

impl<T> Ring<T> {
    pub fn new(capacity: usize) -> Self {
        Ring {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an element; hands it back when the ring is full.
    pub fn push(&mut self, element: T) -> Result<(), T> {
        if self.buf.len() >= self.capacity {
            return Err(element);
        }
        self.buf.push_back(element);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<T> {
        self.buf.pop_front()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Why a push did not take the element.
#[derive(Debug)]
pub enum PushError<T> {
    /// Queue lock not acquired within its timeout.
    LockTimeout(T),
    /// Ring at capacity.
    Full(T),
}

impl<T> PushError<T> {
    /// Recover the element that was not enqueued.
    pub fn into_inner(self) -> T {
        match self {
            PushError::LockTimeout(e) | PushError::Full(e) => e,
        }
    }
}

impl<T> fmt::Display for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushError::LockTimeout(_) => write!(f, "Queue lock timed out"),
            PushError::Full(_) => write!(f, "Queue full"),
        }
    }
}

/// Shared handle to a lock-guarded ring.
pub struct ThreadQueue<T> {
    inner: Arc<ThreadLock<Ring<T>>>,
}

impl<T> Clone for ThreadQueue<T> {
    fn clone(&self) -> Self {
        ThreadQueue {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> ThreadQueue<T> {
    pub fn new(capacity: usize, lock_timeout: Duration) -> Self {
        ThreadQueue {
            inner: Arc::new(ThreadLock::new(Ring::new(capacity), lock_timeout)),
        }
    }

    /// Enqueue an element and wake one waiting worker.
    pub fn push(&self, element: T) -> Result<(), PushError<T>> {
        let mut ring = match self.inner.try_lock() {
            Some(guard) => guard,
            None => return Err(PushError::LockTimeout(element)),
        };
        ring.push(element).map_err(PushError::Full)?;
        drop(ring);
        self.inner.notify();
        Ok(())
    }

    /// Pop one element. `Err(())` means the lock was contended past its
    /// timeout, `Ok(None)` that the queue was empty.
    pub fn try_pop(&self) -> Result<Option<T>, ()> {
        match self.inner.try_lock() {
            Some(mut ring) => Ok(ring.pop()),
            None => Err(()),
        }
    }

    pub fn len(&self) -> Option<usize> {
        self.inner.try_lock().map(|ring| ring.len())
    }

    /// Block briefly until a push signals, or the lock timeout elapses.
    fn wait_for_element(&self) {
        self.inner.wait();
    }

    fn wake_all(&self) {
        self.inner.notify();
    }
}

const STATE_STOPPED: u8 = 0;
const STATE_RUNNING: u8 = 1;
const STATE_TO_STOP: u8 = 2;

/// Pool lifecycle error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// `start` called while not STOPPED.
    AlreadyRunning,
    /// `stop` called while not RUNNING.
    NotRunning,
    /// A worker thread could not be spawned; the pool rolled back to
    /// STOPPED.
    WorkerSpawn(String),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::AlreadyRunning => write!(f, "Thread pool already running"),
            PoolError::NotRunning => write!(f, "Thread pool not running"),
            PoolError::WorkerSpawn(e) => write!(f, "Could not spawn pool worker: {}", e),
        }
    }
}

impl std::error::Error for PoolError {}

/// Counters maintained by the workers.
#[derive(Default)]
struct Counters {
    lock_blocked: AtomicU64,
    received: AtomicU64,
    processed: AtomicU64,
    lost: AtomicU64,
}

/// Point-in-time view of the pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStatistics {
    /// Worker passes that lost the queue lock race.
    pub lock_blocked: u64,
    /// Elements popped off the queue.
    pub received: u64,
    /// Elements the callback accepted.
    pub processed: u64,
    /// Elements the callback rejected.
    pub lost: u64,
}

/// Per-element processing callback. Returning false counts the element
/// as lost; the callback owns the element either way.
pub type ProcessFn<T> = Arc<dyn Fn(T) -> bool + Send + Sync>;

/// Pool sizing.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolConfig {
    /// Worker count; 0 means one per available core.
    pub num_threads: usize,
}

/// Worker pool draining one `ThreadQueue`.
pub struct ThreadPool<T> {
    queue: ThreadQueue<T>,
    process: ProcessFn<T>,
    state: Arc<AtomicU8>,
    counters: Arc<Counters>,
    workers: Vec<JoinHandle<()>>,
    num_threads: usize,
}

impl<T: Send + 'static> ThreadPool<T> {
    pub fn new(queue: ThreadQueue<T>, process: ProcessFn<T>, config: PoolConfig) -> Self {
        let num_threads = if config.num_threads > 0 {
            config.num_threads
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        };
        ThreadPool {
            queue,
            process,
            state: Arc::new(AtomicU8::new(STATE_STOPPED)),
            counters: Arc::new(Counters::default()),
            workers: Vec::new(),
            num_threads,
        }
    }

    /// Spawn the workers. Valid only from STOPPED.
    pub fn start(&mut self) -> Result<(), PoolError> {
        self.state
            .compare_exchange(
                STATE_STOPPED,
                STATE_RUNNING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|_| PoolError::AlreadyRunning)?;

        for n in 0..self.num_threads {
            let queue = self.queue.clone();
            let process = Arc::clone(&self.process);
            let state = Arc::clone(&self.state);
            let counters = Arc::clone(&self.counters);
            let handle = std::thread::Builder::new()
                .name(format!("dtn-pool-{}", n))
                .spawn(move || worker_loop(queue, process, state, counters));
            match handle {
                Ok(h) => self.workers.push(h),
                Err(e) => {
                    // A partial pool would run with fewer workers than
                    // configured; roll back to STOPPED instead.
                    log::error!("Could not spawn pool worker {}: {}", n, e);
                    self.shut_down_workers();
                    return Err(PoolError::WorkerSpawn(e.to_string()));
                }
            }
        }

        log::debug!("Thread pool started with {} workers", self.workers.len());
        Ok(())
    }

    /// Drain in-flight callbacks and join the workers. Valid only from
    /// RUNNING. Elements still queued are untouched.
    pub fn stop(&mut self) -> Result<(), PoolError> {
        self.state
            .compare_exchange(
                STATE_RUNNING,
                STATE_TO_STOP,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|_| PoolError::NotRunning)?;

        self.shut_down_workers();
        log::debug!("Thread pool stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_RUNNING
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    pub fn statistics(&self) -> PoolStatistics {
        PoolStatistics {
            lock_blocked: self.counters.lock_blocked.load(Ordering::Relaxed),
            received: self.counters.received.load(Ordering::Relaxed),
            processed: self.counters.processed.load(Ordering::Relaxed),
            lost: self.counters.lost.load(Ordering::Relaxed),
        }
    }
}

impl<T> ThreadPool<T> {
    /// Signal TO_STOP, join every spawned worker, and land in STOPPED.
    fn shut_down_workers(&mut self) {
        self.state.store(STATE_TO_STOP, Ordering::Release);
        self.queue.wake_all();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("Pool worker panicked");
            }
        }
        self.state.store(STATE_STOPPED, Ordering::Release);
    }
}

impl<T> Drop for ThreadPool<T> {
    fn drop(&mut self) {
        if self.state.load(Ordering::Acquire) != STATE_RUNNING {
            return;
        }
        self.shut_down_workers();
    }
}

fn worker_loop<T>(
    queue: ThreadQueue<T>,
    process: ProcessFn<T>,
    state: Arc<AtomicU8>,
    counters: Arc<Counters>,
) {
    while state.load(Ordering::Acquire) == STATE_RUNNING {
        match queue.try_pop() {
            Err(()) => {
                counters.lock_blocked.fetch_add(1, Ordering::Relaxed);
            }
            Ok(None) => {
                // Empty queue: sleep until a push signals or the
                // bounded wait elapses, then re-check the state.
                queue.wait_for_element();
            }
            Ok(Some(element)) => {
                counters.received.fetch_add(1, Ordering::Relaxed);
                if process(element) {
                    counters.processed.fetch_add(1, Ordering::Relaxed);
                } else {
                    counters.lost.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }
}
