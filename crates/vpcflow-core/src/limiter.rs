//! Per-region concurrency limit

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Caps how many gateway-heavy tasks run against one region at a time.
///
/// Semaphores are created lazily, one per region seen.
#[derive(Clone)]
pub struct RegionLimiter {
    per_region: usize,
    regions: Arc<Mutex<HashMap<String, Arc<Semaphore>>>>,
}

impl RegionLimiter {
    pub fn new(per_region: usize) -> Self {
        Self {
            per_region: per_region.max(1),
            regions: Arc::default(),
        }
    }

    fn semaphore(&self, region: &str) -> Arc<Semaphore> {
        let mut regions = self.regions.lock().unwrap_or_else(PoisonError::into_inner);
        regions
            .entry(region.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.per_region)))
            .clone()
    }

    /// Wait for a slot in `region`.
    ///
    /// Returns `None` only if the semaphore was closed, which never happens
    /// while the limiter is alive.
    pub async fn acquire(&self, region: &str) -> Option<OwnedSemaphorePermit> {
        self.semaphore(region).acquire_owned().await.ok()
    }

    #[cfg(test)]
    fn available(&self, region: &str) -> usize {
        self.semaphore(region).available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_regions_are_limited_independently() {
        let limiter = RegionLimiter::new(2);

        let _a1 = limiter.acquire("us-east-1").await.unwrap();
        let _a2 = limiter.acquire("us-east-1").await.unwrap();
        assert_eq!(limiter.available("us-east-1"), 0);
        assert_eq!(limiter.available("eu-west-1"), 2);

        let blocked =
            tokio::time::timeout(std::time::Duration::from_millis(20), limiter.acquire("us-east-1"))
                .await;
        assert!(blocked.is_err());
    }

    #[tokio::test]
    async fn test_permit_is_released_on_drop() {
        let limiter = RegionLimiter::new(1);
        {
            let _permit = limiter.acquire("us-east-1").await.unwrap();
            assert_eq!(limiter.available("us-east-1"), 0);
        }
        assert_eq!(limiter.available("us-east-1"), 1);
    }

    #[test]
    fn test_zero_is_raised_to_one() {
        assert_eq!(RegionLimiter::new(0).available("us-east-1"), 1);
    }
}
