use std::time::Duration;

use async_trait::async_trait;

/// Wait strategy between consecutive oracle calls.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn wait(&self);
}

/// Sleeps a fixed interval. Production default is 1.5 s to stay under the
/// vision API's rate limit.
pub struct FixedDelay(pub Duration);

#[async_trait]
impl Pacer for FixedDelay {
    async fn wait(&self) {
        tokio::time::sleep(self.0).await;
    }
}

pub struct NoDelay;

#[async_trait]
impl Pacer for NoDelay {
    async fn wait(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fixed_delay_sleeps_for_interval() {
        let start = tokio::time::Instant::now();
        FixedDelay(Duration::from_millis(1500)).wait().await;
        assert!(start.elapsed() >= Duration::from_millis(1500));
    }
}
