// Listener metrics tracking
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Tracks what happens to every notification the listener sees
#[derive(Debug)]
pub struct ListenerMetrics {
    /// Total notifications received from the WebSocket
    pub total_received: AtomicU64,
    /// Notifications without the mint-initialization marker
    pub filtered_early: AtomicU64,
    /// Marker events dropped by probabilistic load shedding
    pub shed: AtomicU64,
    /// Marker events dropped by the fetch cooldown
    pub cooldown_skipped: AtomicU64,
    /// Events that proceeded to a transaction fetch
    pub passed_to_fetch: AtomicU64,
    /// Successfully registered new mints
    pub tokens_detected: AtomicU64,
    /// Fetch or parse failures
    pub detection_failures: AtomicU64,
    /// Signatures or mints already seen
    pub duplicates: AtomicU64,
}

impl ListenerMetrics {
    pub fn new() -> Self {
        Self {
            total_received: AtomicU64::new(0),
            filtered_early: AtomicU64::new(0),
            shed: AtomicU64::new(0),
            cooldown_skipped: AtomicU64::new(0),
            passed_to_fetch: AtomicU64::new(0),
            tokens_detected: AtomicU64::new(0),
            detection_failures: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
        }
    }

    pub fn record_received(&self) {
        self.total_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_filtered(&self) {
        self.filtered_early.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_shed(&self) {
        self.shed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cooldown_skip(&self) {
        self.cooldown_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_passed(&self) {
        self.passed_to_fetch.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_detected(&self) {
        self.tokens_detected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.detection_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_received: self.total_received.load(Ordering::Relaxed),
            filtered_early: self.filtered_early.load(Ordering::Relaxed),
            shed: self.shed.load(Ordering::Relaxed),
            cooldown_skipped: self.cooldown_skipped.load(Ordering::Relaxed),
            passed_to_fetch: self.passed_to_fetch.load(Ordering::Relaxed),
            tokens_detected: self.tokens_detected.load(Ordering::Relaxed),
            detection_failures: self.detection_failures.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
        }
    }

    pub fn log_summary(&self) {
        let s = self.snapshot();
        log::info!(
            "Listener metrics: received={} filtered={} ({:.1}%) shed={} cooldown={} fetched={} detected={} failures={} duplicates={}",
            s.total_received,
            s.filtered_early,
            s.filter_effectiveness_percent(),
            s.shed,
            s.cooldown_skipped,
            s.passed_to_fetch,
            s.tokens_detected,
            s.detection_failures,
            s.duplicates,
        );
    }
}

impl Default for ListenerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable snapshot of listener metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_received: u64,
    pub filtered_early: u64,
    pub shed: u64,
    pub cooldown_skipped: u64,
    pub passed_to_fetch: u64,
    pub tokens_detected: u64,
    pub detection_failures: u64,
    pub duplicates: u64,
}

impl MetricsSnapshot {
    pub fn filter_effectiveness_percent(&self) -> f64 {
        if self.total_received == 0 {
            return 0.0;
        }
        (self.filtered_early as f64 / self.total_received as f64) * 100.0
    }

    pub fn detection_rate_percent(&self) -> f64 {
        if self.passed_to_fetch == 0 {
            return 0.0;
        }
        (self.tokens_detected as f64 / self.passed_to_fetch as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_tracking() {
        let metrics = ListenerMetrics::new();

        metrics.record_received();
        metrics.record_received();
        metrics.record_received();
        metrics.record_filtered();
        metrics.record_shed();
        metrics.record_passed();
        metrics.record_detected();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_received, 3);
        assert_eq!(snapshot.filtered_early, 1);
        assert_eq!(snapshot.shed, 1);
        assert_eq!(snapshot.passed_to_fetch, 1);
        assert_eq!(snapshot.tokens_detected, 1);
    }

    #[test]
    fn test_filter_effectiveness() {
        let metrics = ListenerMetrics::new();

        for _ in 0..100 {
            metrics.record_received();
        }
        for _ in 0..90 {
            metrics.record_filtered();
        }

        let snapshot = metrics.snapshot();
        assert!((snapshot.filter_effectiveness_percent() - 90.0).abs() < 0.01);
    }

    #[test]
    fn test_rates_with_no_traffic() {
        let snapshot = ListenerMetrics::new().snapshot();
        assert_eq!(snapshot.filter_effectiveness_percent(), 0.0);
        assert_eq!(snapshot.detection_rate_percent(), 0.0);
    }
}
