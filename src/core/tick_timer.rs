// Fixed-delay tick scheduling with a single pending timer

use std::future::pending;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::{sleep, Instant, Sleep};

/// Holds at most one pending tick deadline.
///
/// Scheduling replaces whatever was pending, so at most one next tick exists
/// at any time.
#[derive(Debug, Default)]
pub struct TickTimer {
    pending: Option<Pin<Box<Sleep>>>,
}

impl TickTimer {
    pub fn new() -> Self {
        Self { pending: None }
    }

    /// Arm the timer to fire `delay` from now, dropping any pending deadline
    pub fn schedule(&mut self, delay: Duration) {
        self.pending = Some(Box::pin(sleep(delay)));
    }

    /// Disarm the timer. Returns whether a deadline was pending.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|sleep| sleep.deadline())
    }

    /// Wait for the pending deadline. Never resolves while nothing is scheduled.
    ///
    /// Cancel safe: if the returned future is dropped early the deadline stays armed.
    pub async fn fired(&mut self) {
        match self.pending.as_mut() {
            Some(sleep) => {
                sleep.as_mut().await;
                self.pending = None;
            }
            None => pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let mut timer = TickTimer::new();
        let start = Instant::now();

        timer.schedule(Duration::from_millis(50));
        assert!(timer.is_pending());
        timer.fired().await;

        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(!timer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_replaces_pending_deadline() {
        let mut timer = TickTimer::new();
        let start = Instant::now();

        timer.schedule(Duration::from_millis(500));
        timer.schedule(Duration::from_millis(50));
        assert_eq!(timer.deadline(), Some(start + Duration::from_millis(50)));

        timer.fired().await;
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        let mut timer = TickTimer::new();
        timer.schedule(Duration::from_millis(50));
        assert!(timer.cancel());
        assert!(!timer.cancel());

        let fired = tokio::time::timeout(Duration::from_secs(1), timer.fired()).await;
        assert!(fired.is_err());
    }
}
