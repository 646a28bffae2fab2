use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Sweep-wide spacing between consecutive outbound provider calls.
///
/// Shared by the brief writer and the recheck scheduler so the delay applies
/// across the whole sweep rather than per tenant.
pub struct CallPacer {
    delay: Duration,
    last_call: Mutex<Option<Instant>>,
    calls: AtomicU64,
}

impl CallPacer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_call: Mutex::new(None),
            calls: AtomicU64::new(0),
        }
    }

    /// No spacing. For tests and offline runs.
    pub fn unpaced() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Wait until at least `delay` has passed since the previous call, then
    /// claim the slot.
    pub async fn pace(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.delay {
                tokio::time::sleep(self.delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
        self.calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_call_is_not_delayed() {
        let pacer = CallPacer::new(Duration::from_secs(30));
        let start = Instant::now();
        pacer.pace().await;
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(pacer.calls(), 1);
    }

    #[tokio::test]
    async fn consecutive_calls_are_spaced() {
        let pacer = CallPacer::new(Duration::from_millis(40));
        let start = Instant::now();
        pacer.pace().await;
        pacer.pace().await;
        pacer.pace().await;
        assert!(
            start.elapsed() >= Duration::from_millis(80),
            "three calls should span two delays, took {:?}",
            start.elapsed()
        );
        assert_eq!(pacer.calls(), 3);
    }
}
