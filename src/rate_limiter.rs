//! Minimum-interval guard for outbound provider calls.
//!
//! Each caller reserves the next free time slot under a short lock and then sleeps
//! outside of it, so concurrent resolutions are spaced `min_interval` apart without
//! holding the mutex across the wait. A cancelled token ends the wait early.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Rate limiter enforcing a minimum interval between permitted calls.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits until the caller may issue its next call.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The call slot was reached
    /// * `Err(Error::Cancelled)` - The token was cancelled before or during the wait
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let now = Instant::now();
        let (slot, previous) = {
            let mut last = self.last_call.lock().await;
            let previous = *last;
            let slot = match previous {
                Some(previous) => (previous + self.min_interval).max(now),
                None => now,
            };
            *last = Some(slot);
            (slot, previous)
        };

        if slot > now {
            log::debug!("Rate limiting: waiting {:?}", slot - now);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.release(slot, previous).await;
                    return Err(Error::Cancelled);
                }
                _ = sleep_until(slot) => {}
            }
        }

        Ok(())
    }

    /// Hands an unused slot back, unless a later caller already queued behind it.
    async fn release(&self, slot: Instant, previous: Option<Instant>) {
        let mut last = self.last_call.lock().await;
        if *last == Some(slot) {
            *last = previous;
        }
    }
}
