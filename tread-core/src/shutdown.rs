//! Cooperative cancellation
//!
//! A [`StopToken`] is an atomic flag paired with a [`Signal`] wake. Loops
//! check the flag between steps and select their timed waits against the
//! signal, so a stop request is observed without polling.
//!
//! One task waits on a token at a time; give each loop its own token.

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Timer};

/// Outcome of an interruptible wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Wait {
    /// The full duration passed
    Elapsed,
    /// A stop was requested first
    Cancelled,
}

impl Wait {
    pub fn is_cancelled(self) -> bool {
        self == Wait::Cancelled
    }
}

/// Stop request shared between a loop and whoever may end it
pub struct StopToken<M: RawMutex> {
    stopped: AtomicBool,
    wake: Signal<M, ()>,
}

impl<M: RawMutex> StopToken<M> {
    pub const fn new() -> Self {
        Self {
            stopped: AtomicBool::new(false),
            wake: Signal::new(),
        }
    }

    /// Request the loop to stop and wake it if it is waiting
    pub fn request_stop(&self) {
        self.stopped.store(true, Ordering::Release);
        self.wake.signal(());
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Clear a previous stop request so the token can be reused
    pub fn reset(&self) {
        self.stopped.store(false, Ordering::Release);
        self.wake.reset();
    }

    /// Wait until a stop is requested
    pub async fn wait(&self) {
        while !self.is_stopped() {
            self.wake.wait().await;
        }
    }

    /// Sleep until `deadline` unless a stop is requested first
    pub async fn sleep_until(&self, deadline: Instant) -> Wait {
        if self.is_stopped() {
            return Wait::Cancelled;
        }
        match select(Timer::at(deadline), self.wait()).await {
            Either::First(()) => Wait::Elapsed,
            Either::Second(()) => Wait::Cancelled,
        }
    }

    /// Sleep for `duration` unless a stop is requested first
    pub async fn sleep(&self, duration: Duration) -> Wait {
        let deadline = Instant::now()
            .checked_add(duration)
            .unwrap_or(Instant::MAX);
        self.sleep_until(deadline).await
    }
}

impl<M: RawMutex> Default for StopToken<M> {
    fn default() -> Self {
        Self::new()
    }
}
