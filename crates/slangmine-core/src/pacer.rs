//! Global pacing of external calls.
//!
//! Each external client (generative, search) owns one [`Pacer`]. Every
//! network call waits on it first, so consecutive calls of the same kind are
//! at least `interval` apart regardless of which key they are for. Waiting
//! is the one place a run can be cancelled.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::Cancelled;

pub struct Pacer {
    interval: Duration,
    last_call: Mutex<Option<Instant>>,
    cancel: CancellationToken,
}

impl Pacer {
    pub fn new(interval: Duration, cancel: CancellationToken) -> Self {
        Self {
            interval,
            last_call: Mutex::new(None),
            cancel,
        }
    }

    /// A pacer that never delays and is never cancelled.
    pub fn unpaced() -> Self {
        Self::new(Duration::ZERO, CancellationToken::new())
    }

    /// Wait for the next call slot, then claim it.
    ///
    /// Returns [`Cancelled`] if the token fires before or while waiting; the
    /// slot is not claimed in that case.
    pub async fn wait(&self) -> Result<(), Cancelled> {
        if self.cancel.is_cancelled() {
            return Err(Cancelled);
        }

        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let ready_at = prev + self.interval;
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Cancelled),
                _ = tokio::time::sleep_until(ready_at) => {}
            }
        }
        *last = Some(Instant::now());
        Ok(())
    }
}
