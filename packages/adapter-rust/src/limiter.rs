//! Per-operation concurrency and rate limiting.
//!
//! Every pipeline attempt holds a [`Lease`] for its operation name while the
//! body runs. The semaphore-backed limiter bounds in-flight work per key;
//! the sliding-window limiter bounds admissions per time window; the no-op
//! limiter satisfies the same contract for deployments that disable
//! throttling, so callers never know which variant is active.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{AdapterError, ConfigError};

// ---------------------------------------------------------------------------
// Lease
// ---------------------------------------------------------------------------

/// One held slot. Dropping releases it; [`Lease::release`] may be called any
/// number of times but frees the slot at most once.
#[derive(Debug)]
pub struct Lease {
    slot: Option<OwnedSemaphorePermit>,
}

impl Lease {
    /// A lease that holds no slot: used by the no-op limiter, and by the
    /// sliding-window limiter whose admission record outlives the caller.
    #[must_use]
    pub fn unbounded() -> Self {
        Self { slot: None }
    }

    pub fn release(&mut self) {
        self.slot.take();
    }
}

// ---------------------------------------------------------------------------
// ConcurrencyLimiter trait
// ---------------------------------------------------------------------------

/// Caps work per logical resource key (the operation name).
#[async_trait]
pub trait ConcurrencyLimiter: Send + Sync {
    /// Wait (asynchronously, never by spinning) until a slot for
    /// `resource_key` is free.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError::Canceled` if the token fires while waiting.
    async fn acquire(
        &self,
        resource_key: &str,
        cancel: &CancellationToken,
    ) -> Result<Lease, AdapterError>;
}

// ---------------------------------------------------------------------------
// KeyedSemaphoreLimiter
// ---------------------------------------------------------------------------

/// Semaphore per resource key; waiting callers queue in FIFO order.
pub struct KeyedSemaphoreLimiter {
    permits_per_key: usize,
    slots: DashMap<String, Arc<Semaphore>>,
}

impl KeyedSemaphoreLimiter {
    /// # Errors
    ///
    /// Returns `ConfigError::Concurrency` for a zero permit count, which
    /// would deadlock every caller.
    pub fn new(permits_per_key: usize) -> Result<Self, ConfigError> {
        if permits_per_key == 0 {
            return Err(ConfigError::Concurrency {
                reason: "permit count must be positive".to_string(),
            });
        }
        Ok(Self {
            permits_per_key,
            slots: DashMap::new(),
        })
    }

    fn slot(&self, resource_key: &str) -> Arc<Semaphore> {
        self.slots
            .entry(resource_key.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.permits_per_key)))
            .clone()
    }
}

#[async_trait]
impl ConcurrencyLimiter for KeyedSemaphoreLimiter {
    async fn acquire(
        &self,
        resource_key: &str,
        cancel: &CancellationToken,
    ) -> Result<Lease, AdapterError> {
        let semaphore = self.slot(resource_key);
        tokio::select! {
            permit = semaphore.acquire_owned() => {
                // The semaphore is never closed, so acquisition cannot fail.
                let Ok(permit) = permit else {
                    return Err(AdapterError::Canceled);
                };
                Ok(Lease { slot: Some(permit) })
            }
            () = cancel.cancelled() => Err(AdapterError::Canceled),
        }
    }
}

// ---------------------------------------------------------------------------
// SlidingWindowLimiter
// ---------------------------------------------------------------------------

/// Admits at most `max_per_window` operations per key per window. The
/// admission timestamp is retained for the full window, so the returned
/// lease holds no slot and releasing it is a no-op.
pub struct SlidingWindowLimiter {
    max_per_window: usize,
    window: Duration,
    admissions: DashMap<String, parking_lot::Mutex<VecDeque<Instant>>>,
}

impl SlidingWindowLimiter {
    /// # Errors
    ///
    /// Returns `ConfigError::Concurrency` when the admission count is zero
    /// or the window is empty.
    pub fn new(max_per_window: usize, window: Duration) -> Result<Self, ConfigError> {
        if max_per_window == 0 {
            return Err(ConfigError::Concurrency {
                reason: "admission count must be positive".to_string(),
            });
        }
        if window.is_zero() {
            return Err(ConfigError::Concurrency {
                reason: "window must be positive".to_string(),
            });
        }
        Ok(Self {
            max_per_window,
            window,
            admissions: DashMap::new(),
        })
    }

    /// Record an admission if the window has room, else return how long
    /// until the oldest admission ages out.
    fn try_admit(&self, resource_key: &str) -> Result<(), Duration> {
        let entry = self
            .admissions
            .entry(resource_key.to_string())
            .or_default();
        let mut stamps = entry.lock();
        let now = Instant::now();
        while stamps
            .front()
            .is_some_and(|stamp| now.duration_since(*stamp) >= self.window)
        {
            stamps.pop_front();
        }
        if stamps.len() < self.max_per_window {
            stamps.push_back(now);
            return Ok(());
        }
        let wait = match stamps.front() {
            Some(oldest) => self.window.saturating_sub(now.duration_since(*oldest)),
            None => Duration::ZERO,
        };
        Err(wait)
    }
}

#[async_trait]
impl ConcurrencyLimiter for SlidingWindowLimiter {
    async fn acquire(
        &self,
        resource_key: &str,
        cancel: &CancellationToken,
    ) -> Result<Lease, AdapterError> {
        loop {
            if cancel.is_cancelled() {
                return Err(AdapterError::Canceled);
            }
            match self.try_admit(resource_key) {
                Ok(()) => return Ok(Lease::unbounded()),
                Err(wait) => {
                    tokio::select! {
                        () = tokio::time::sleep(wait) => {}
                        () = cancel.cancelled() => return Err(AdapterError::Canceled),
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// NoopLimiter
// ---------------------------------------------------------------------------

/// For deployments with throttling disabled. Same contract: a valid lease
/// with idempotent release, and cancellation is still honored.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLimiter;

#[async_trait]
impl ConcurrencyLimiter for NoopLimiter {
    async fn acquire(
        &self,
        _resource_key: &str,
        cancel: &CancellationToken,
    ) -> Result<Lease, AdapterError> {
        if cancel.is_cancelled() {
            return Err(AdapterError::Canceled);
        }
        Ok(Lease::unbounded())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
