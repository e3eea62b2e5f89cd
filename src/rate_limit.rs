use std::time::Duration;

/// Fixed delay between consecutive sends, to stay under provider limits.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    interval: Duration,
}

impl Pacing {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn none() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Sleeps after the `idx`-th (1-based) of `total` sends, unless it was the last.
    pub async fn wait_after(&self, idx: usize, total: usize, what: &str) {
        if idx >= total || self.interval.is_zero() {
            return;
        }
        tracing::info!(
            "Waiting {} seconds before next {what}...",
            self.interval.as_secs()
        );
        tokio::time::sleep(self.interval).await;
    }
}
