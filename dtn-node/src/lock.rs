//! Timeout-bounded mutual exclusion.
//!
//! `ThreadLock<T>` wraps the value it protects and hands out RAII guards,
//! so release happens on every exit path. Acquisition waits at most the
//! configured timeout; timing out is an expected outcome under contention
//! and callers surface it as a recoverable failure, never a panic.
//!
//! A paired condition allows a holder-free notify/wait handshake, used by
//! the worker pool to signal "queue non-empty".

use std::sync::{Condvar, Mutex, MutexGuard, TryLockError};
use std::time::{Duration, Instant};

/// Default acquisition timeout: 100ms, matching the stores' default.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_micros(100_000);

/// Interval between acquisition attempts while waiting for the lock.
const POLL_INTERVAL: Duration = Duration::from_micros(100);

/// A mutex around `T` whose acquisition is bounded by a timeout.
pub struct ThreadLock<T> {
    value: Mutex<T>,
    timeout: Duration,
    signal: Mutex<u64>,
    signal_cond: Condvar,
}

/// Guard over the protected value. Dropping it releases the lock.
pub type Guard<'a, T> = MutexGuard<'a, T>;

impl<T> ThreadLock<T> {
    pub fn new(value: T, timeout: Duration) -> Self {
        ThreadLock {
            value: Mutex::new(value),
            timeout,
            signal: Mutex::new(0),
            signal_cond: Condvar::new(),
        }
    }

    pub fn with_default_timeout(value: T) -> Self {
        Self::new(value, DEFAULT_TIMEOUT)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Try to acquire the lock, waiting up to the configured timeout.
    /// Returns `None` on timeout or if a panicking holder poisoned the
    /// value.
    pub fn try_lock(&self) -> Option<Guard<'_, T>> {
        let deadline = Instant::now() + self.timeout;
        loop {
            match self.value.try_lock() {
                Ok(guard) => return Some(guard),
                Err(TryLockError::WouldBlock) => {
                    if Instant::now() >= deadline {
                        log::warn!("Lock acquisition timed out after {:?}", self.timeout);
                        return None;
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(TryLockError::Poisoned(_)) => {
                    log::error!("Lock poisoned by a panicking holder");
                    return None;
                }
            }
        }
    }

    /// Wake all threads blocked in `wait`.
    pub fn notify(&self) {
        if let Ok(mut seq) = self.signal.lock() {
            *seq = seq.wrapping_add(1);
            self.signal_cond.notify_all();
        }
    }

    /// Block up to the configured timeout for a `notify`. Returns true if
    /// a notification arrived, false on timeout. The value lock must NOT
    /// be held by the caller; waiting does not touch it.
    pub fn wait(&self) -> bool {
        let seq = match self.signal.lock() {
            Ok(g) => g,
            Err(_) => return false,
        };
        let start = *seq;
        let (_guard, result) = match self
            .signal_cond
            .wait_timeout_while(seq, self.timeout, |s| *s == start)
        {
            Ok(r) => r,
            Err(_) => return false,
        };
        !result.timed_out()
    }
}
