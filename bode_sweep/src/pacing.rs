//! Timed waits and cooperative cancellation.
//!
//! Settle delays are the only suspension points of a sweep. They go
//! through a [`Clock`] so tests can run against virtual time, and every
//! wait observes a [`CancelToken`].

use crate::error::SweepError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::trace;

/// Shared cancellation flag.
///
/// Cloned into a signal handler; the sweep checks it between steps and
/// inside every wait.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once cancellation has been requested.
    #[inline]
    pub fn check(&self) -> Result<(), SweepError> {
        if self.is_cancelled() {
            Err(SweepError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Time source for settle delays and timeouts.
pub trait Clock {
    /// Time elapsed since the clock was created.
    fn now(&self) -> Duration;

    /// Wait for `duration`, returning `Err(Cancelled)` as soon as the token fires.
    ///
    /// The token is checked before waiting, so a zero-length wait is still
    /// a cancellation point.
    fn sleep(&mut self, duration: Duration, cancel: &CancelToken) -> Result<(), SweepError>;
}

/// Wall-clock implementation sleeping the current thread in slices.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
    slice: Duration,
}

impl SystemClock {
    /// Longest uninterrupted sleep; bounds cancellation latency.
    pub const DEFAULT_SLICE: Duration = Duration::from_millis(10);

    /// Create a clock starting now.
    pub fn new() -> Self {
        Self::with_slice(Self::DEFAULT_SLICE)
    }

    /// Create a clock with a custom cancellation slice.
    pub fn with_slice(slice: Duration) -> Self {
        Self {
            origin: Instant::now(),
            slice: slice.max(Duration::from_micros(100)),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&mut self, duration: Duration, cancel: &CancelToken) -> Result<(), SweepError> {
        let deadline = Instant::now().checked_add(duration).ok_or_else(|| {
            SweepError::InvalidRange(format!("wait of {duration:?} is beyond the system clock"))
        })?;
        loop {
            cancel.check()?;
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(());
            }
            thread::sleep(remaining.min(self.slice));
        }
    }
}

/// Simulated time: sleeping advances the clock instantly.
#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    elapsed: Duration,
    sleeps: u64,
}

impl VirtualClock {
    /// Create a clock at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of completed sleeps.
    pub fn sleep_count(&self) -> u64 {
        self.sleeps
    }

    /// Move time forward without a sleep, e.g. to model a slow instrument.
    pub fn advance(&mut self, duration: Duration) {
        self.elapsed = self.elapsed.saturating_add(duration);
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> Duration {
        self.elapsed
    }

    fn sleep(&mut self, duration: Duration, cancel: &CancelToken) -> Result<(), SweepError> {
        cancel.check()?;
        trace!("virtual sleep {:?} at {:?}", duration, self.elapsed);
        self.elapsed = self.elapsed.saturating_add(duration);
        self.sleeps += 1;
        Ok(())
    }
}
