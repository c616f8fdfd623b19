//! Short-TTL memoization of detection results.
//!
//! Process-wide, single-writer (the detection engine), last-write-wins.
//! Each engine instance owns its own cache; staleness across service
//! instances is bounded by the TTL and accepted. Callers that need fresh
//! data bypass with the refresh flag.

use crate::models::DetectionResult;
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Cache key for the single-tenant-per-process deployment
pub const DEFAULT_SCOPE: &str = "default";

#[derive(Clone)]
struct CachedScan {
    result: DetectionResult,
    cached_at: Instant,
}

pub struct ScanCache {
    entries: DashMap<String, CachedScan>,
    ttl: Duration,
}

impl ScanCache {
    pub fn new(ttl: Duration) -> Self {
        Self { entries: DashMap::new(), ttl }
    }

    /// Memoized result for the scope, if still within TTL
    pub fn get(&self, scope: &str) -> Option<DetectionResult> {
        let entry = self.entries.get(scope)?;
        if entry.cached_at.elapsed() < self.ttl {
            Some(entry.result.clone())
        } else {
            None
        }
    }

    pub fn put(&self, scope: &str, result: DetectionResult) {
        self.entries
            .insert(scope.to_string(), CachedScan { result, cached_at: Instant::now() });
    }

    /// Drop every memoized scan. Called after each successful executor
    /// action and on drift-tick completion.
    pub fn invalidate(&self) {
        self.entries.clear();
        tracing::debug!("Scan cache invalidated");
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DetectionSummary, ResourceCounts};
    use chrono::Utc;

    fn empty_result() -> DetectionResult {
        DetectionResult {
            detections: vec![],
            summary: DetectionSummary::default(),
            resource_counts: ResourceCounts::default(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_hit_within_ttl() {
        let cache = ScanCache::new(Duration::from_secs(30));
        cache.put(DEFAULT_SCOPE, empty_result());
        assert!(cache.get(DEFAULT_SCOPE).is_some());
    }

    #[test]
    fn test_miss_after_ttl() {
        let cache = ScanCache::new(Duration::from_millis(0));
        cache.put(DEFAULT_SCOPE, empty_result());
        std::thread::sleep(Duration::from_millis(2));
        assert!(cache.get(DEFAULT_SCOPE).is_none());
    }

    #[test]
    fn test_invalidate_clears_all_scopes() {
        let cache = ScanCache::new(Duration::from_secs(30));
        cache.put(DEFAULT_SCOPE, empty_result());
        cache.put("tenant-b", empty_result());
        cache.invalidate();
        assert!(cache.get(DEFAULT_SCOPE).is_none());
        assert!(cache.get("tenant-b").is_none());
    }
}
