//! Wall-clock gating for progress publication.

use std::time::Duration;
use tokio::time::Instant;

/// Default minimum interval between two publications.
pub const DEFAULT_PUBLISH_INTERVAL: Duration = Duration::from_millis(500);

/// Lets a publication through at most once per interval.
///
/// The first call is always let through.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl ProgressThrottle {
    /// Create a throttle with the given minimum interval.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Whether a publication may happen now. Records the publication if so.
    pub fn ready(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_PUBLISH_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_throttle_gates_by_interval() {
        let mut throttle = ProgressThrottle::default();

        assert!(throttle.ready());
        assert!(!throttle.ready());

        tokio::time::advance(Duration::from_millis(499)).await;
        assert!(!throttle.ready());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(throttle.ready());
        assert!(!throttle.ready());
    }
}
