// Connection health: heartbeat bookkeeping and reachability flap damping

use chrono::{DateTime, Utc};
use log::{info, warn};

/// Tracks subscription liveness and RPC reachability.
///
/// The connected flag only drops after `failure_threshold` consecutive
/// reachability failures, so one slow poll does not flap the status.
#[derive(Debug)]
pub struct ConnectionHealth {
    heartbeat_count: u64,
    last_heartbeat_at: Option<DateTime<Utc>>,
    connected: bool,
    consecutive_failures: u32,
    failure_threshold: u32,
}

impl ConnectionHealth {
    pub fn new(failure_threshold: u32) -> Self {
        Self {
            heartbeat_count: 0,
            last_heartbeat_at: None,
            connected: false,
            consecutive_failures: 0,
            failure_threshold: failure_threshold.max(1),
        }
    }

    pub fn record_heartbeat(&mut self, now: DateTime<Utc>) -> u64 {
        self.heartbeat_count += 1;
        self.last_heartbeat_at = Some(now);
        self.heartbeat_count
    }

    pub fn heartbeat_count(&self) -> u64 {
        self.heartbeat_count
    }

    pub fn last_heartbeat_at(&self) -> Option<DateTime<Utc>> {
        self.last_heartbeat_at
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Subscription established.
    pub fn mark_connected(&mut self) {
        if !self.connected {
            info!("Connection established");
        }
        self.connected = true;
        self.consecutive_failures = 0;
    }

    /// Subscription torn down; bypasses the damping.
    pub fn mark_disconnected(&mut self) {
        if self.connected {
            warn!("Connection lost");
        }
        self.connected = false;
    }

    /// Fold one reachability poll result in. Returns true when the
    /// connected flag changed.
    pub fn record_reachability(&mut self, ok: bool) -> bool {
        if ok {
            self.consecutive_failures = 0;
            if !self.connected {
                info!("RPC reachable again, marking connected");
                self.connected = true;
                return true;
            }
            return false;
        }

        self.consecutive_failures += 1;
        if self.connected && self.consecutive_failures >= self.failure_threshold {
            warn!(
                "RPC unreachable {} times in a row, marking disconnected",
                self.consecutive_failures
            );
            self.connected = false;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_counter() {
        let mut health = ConnectionHealth::new(3);
        assert_eq!(health.heartbeat_count(), 0);
        assert_eq!(health.record_heartbeat(Utc::now()), 1);
        assert_eq!(health.record_heartbeat(Utc::now()), 2);
        assert!(health.last_heartbeat_at().is_some());
    }

    #[test]
    fn test_single_failure_does_not_flap() {
        let mut health = ConnectionHealth::new(3);
        health.mark_connected();

        assert!(!health.record_reachability(false));
        assert!(health.is_connected());
        assert!(!health.record_reachability(false));
        assert!(health.is_connected());

        // A success before the third failure resets the streak
        assert!(!health.record_reachability(true));
        assert_eq!(health.consecutive_failures(), 0);
    }

    #[test]
    fn test_threshold_failures_disconnect() {
        let mut health = ConnectionHealth::new(3);
        health.mark_connected();

        health.record_reachability(false);
        health.record_reachability(false);
        let changed = health.record_reachability(false);
        assert!(changed);
        assert!(!health.is_connected());
    }

    #[test]
    fn test_success_resets_failure_streak() {
        let mut health = ConnectionHealth::new(2);
        health.mark_connected();

        health.record_reachability(false);
        health.record_reachability(true);
        health.record_reachability(false);
        assert!(health.is_connected());
    }

    #[test]
    fn test_recovery_reconnects_immediately() {
        let mut health = ConnectionHealth::new(2);
        health.mark_connected();
        health.record_reachability(false);
        health.record_reachability(false);
        assert!(!health.is_connected());

        let changed = health.record_reachability(true);
        assert!(changed);
        assert!(health.is_connected());
    }

    #[test]
    fn test_zero_threshold_is_clamped() {
        let mut health = ConnectionHealth::new(0);
        health.mark_connected();
        assert!(health.record_reachability(false));
        assert!(!health.is_connected());
    }
}
