// Per-event disposition pipeline: marker filter, probabilistic load
// shedding, then the transaction-fetch cooldown. Runs before any RPC call.

use crate::detection::filters::{should_process_log_notification, LogFilter};
use crate::detection::metrics::ListenerMetrics;
use crate::error::CoreError;
use log::debug;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Listener tuning, sourced from Settings.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Fraction of marker events dropped at random to stay under RPC quota.
    pub shed_rate: f64,
    /// Minimum gap between transaction fetches.
    pub fetch_cooldown_ms: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            shed_rate: 0.30,
            fetch_cooldown_ms: 2000,
        }
    }
}

/// What the listener decided to do with one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventDisposition {
    /// Marker present, all gates passed; fetch this signature.
    Process(String),
    /// No marker, wrong method, or failed transaction.
    Filtered,
    /// Dropped by probabilistic shedding.
    Shed,
    /// Dropped because a fetch happened too recently.
    Cooldown,
}

/// Stateful front end of the detection pipeline. One instance per process;
/// the cooldown watermark is deliberately shared across subscriptions.
pub struct MintListener {
    config: ListenerConfig,
    filter: LogFilter,
    metrics: Arc<ListenerMetrics>,
    last_fetch_at: Option<Instant>,
}

impl MintListener {
    pub fn new(config: ListenerConfig) -> Self {
        Self {
            config,
            filter: LogFilter::new(),
            metrics: Arc::new(ListenerMetrics::new()),
            last_fetch_at: None,
        }
    }

    pub fn metrics(&self) -> Arc<ListenerMetrics> {
        self.metrics.clone()
    }

    /// Classify one raw notification. Order matters: the marker filter runs
    /// first so shedding and cooldown only ever drop real candidates.
    pub fn evaluate_notification(&mut self, json: &Value) -> Result<EventDisposition, CoreError> {
        self.metrics.record_received();

        let signature = match should_process_log_notification(json, &self.filter) {
            Ok(Some(sig)) => sig,
            Ok(None) => {
                self.metrics.record_filtered();
                return Ok(EventDisposition::Filtered);
            }
            Err(msg) => {
                self.metrics.record_filtered();
                return Err(CoreError::ParseError(msg));
            }
        };

        if self.config.shed_rate > 0.0 && rand::random::<f64>() < self.config.shed_rate {
            debug!("Shedding event {}", signature);
            self.metrics.record_shed();
            return Ok(EventDisposition::Shed);
        }

        let now = Instant::now();
        if let Some(last) = self.last_fetch_at {
            let cooldown = Duration::from_millis(self.config.fetch_cooldown_ms);
            if now.duration_since(last) < cooldown {
                debug!("Fetch cooldown active, skipping event {}", signature);
                self.metrics.record_cooldown_skip();
                return Ok(EventDisposition::Cooldown);
            }
        }
        self.last_fetch_at = Some(now);

        self.metrics.record_passed();
        Ok(EventDisposition::Process(signature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn marker_event(signature: &str) -> Value {
        json!({
            "jsonrpc": "2.0",
            "method": "logsNotification",
            "params": {
                "result": {
                    "value": {
                        "signature": signature,
                        "err": null,
                        "logs": ["Program log: Instruction: InitializeMint"]
                    }
                }
            }
        })
    }

    fn plain_event(signature: &str) -> Value {
        json!({
            "jsonrpc": "2.0",
            "method": "logsNotification",
            "params": {
                "result": {
                    "value": {
                        "signature": signature,
                        "err": null,
                        "logs": ["Program log: Instruction: Transfer"]
                    }
                }
            }
        })
    }

    fn listener(shed_rate: f64, cooldown_ms: u64) -> MintListener {
        MintListener::new(ListenerConfig {
            shed_rate,
            fetch_cooldown_ms: cooldown_ms,
        })
    }

    #[test]
    fn test_marker_event_passes_all_gates() {
        let mut l = listener(0.0, 0);
        let d = l.evaluate_notification(&marker_event("sig1")).unwrap();
        assert_eq!(d, EventDisposition::Process("sig1".to_string()));
        assert_eq!(l.metrics().snapshot().passed_to_fetch, 1);
    }

    #[test]
    fn test_non_marker_event_is_filtered_before_other_gates() {
        // With a full shed rate, a filtered event must still report Filtered,
        // and nothing may reach the fetch stage.
        let mut l = listener(1.0, 0);
        let d = l.evaluate_notification(&plain_event("sig1")).unwrap();
        assert_eq!(d, EventDisposition::Filtered);

        let snapshot = l.metrics().snapshot();
        assert_eq!(snapshot.filtered_early, 1);
        assert_eq!(snapshot.shed, 0);
        assert_eq!(snapshot.passed_to_fetch, 0);
    }

    #[test]
    fn test_full_shed_rate_drops_every_marker_event() {
        let mut l = listener(1.0, 0);
        for i in 0..20 {
            let d = l
                .evaluate_notification(&marker_event(&format!("sig{}", i)))
                .unwrap();
            assert_eq!(d, EventDisposition::Shed);
        }
        assert_eq!(l.metrics().snapshot().shed, 20);
    }

    #[test]
    fn test_cooldown_skips_second_event() {
        let mut l = listener(0.0, 60_000);
        let first = l.evaluate_notification(&marker_event("sig1")).unwrap();
        assert_eq!(first, EventDisposition::Process("sig1".to_string()));

        let second = l.evaluate_notification(&marker_event("sig2")).unwrap();
        assert_eq!(second, EventDisposition::Cooldown);
        assert_eq!(l.metrics().snapshot().cooldown_skipped, 1);
    }

    #[test]
    fn test_cooldown_not_charged_by_filtered_events() {
        let mut l = listener(0.0, 60_000);
        l.evaluate_notification(&plain_event("sig1")).unwrap();
        let d = l.evaluate_notification(&marker_event("sig2")).unwrap();
        assert_eq!(d, EventDisposition::Process("sig2".to_string()));
    }

    #[test]
    fn test_broken_notification_is_parse_error() {
        let mut l = listener(0.0, 0);
        let broken = json!({"method": "logsNotification"});
        assert!(l.evaluate_notification(&broken).is_err());
    }
}
