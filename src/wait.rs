//! Suspension points of the control loop. All of them yield to cancellation.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::GuidanceError;

/// Sleep for `duration` unless `cancel` fires first.
pub async fn sleep(cancel: &CancellationToken, duration: Duration) -> Result<(), GuidanceError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(GuidanceError::Cancelled),
        () = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Fail fast if the mission was already cancelled.
pub fn check(cancel: &CancellationToken) -> Result<(), GuidanceError> {
    if cancel.is_cancelled() {
        Err(GuidanceError::Cancelled)
    } else {
        Ok(())
    }
}

/// Upper bound for a polled wait.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    limit: Duration,
}

impl Deadline {
    pub fn after(limit: Duration) -> Self {
        Self { start: Instant::now(), limit }
    }

    pub fn expired(&self) -> bool {
        self.start.elapsed() >= self.limit
    }

    /// Seconds since the wait began.
    pub fn waited(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sleep_completes() {
        let token = CancellationToken::new();
        let before = Instant::now();
        sleep(&token, Duration::from_secs(5)).await.unwrap();
        assert!(before.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_aborts_on_cancel() {
        let token = CancellationToken::new();
        let child = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            child.cancel();
        });
        let before = Instant::now();
        let res = sleep(&token, Duration::from_secs(3600)).await;
        assert!(matches!(res, Err(GuidanceError::Cancelled)));
        assert!(before.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expires() {
        let d = Deadline::after(Duration::from_secs(2));
        assert!(!d.expired());
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(d.expired());
        assert!(d.waited() >= 3.0);
    }
}
