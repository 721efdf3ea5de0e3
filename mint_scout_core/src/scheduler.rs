// Market-check scheduling: the shared queue, batch planning guards, the
// global backoff level and the probe-outcome reducer.
//
// Everything here is synchronous. The daemon drives this state machine from
// its timer tasks; tests drive it directly.

use crate::models::MarketStatus;
use crate::probe::ProbeVerdict;
use crate::store::TokenStore;
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use std::collections::BTreeSet;

/// Scheduler tuning, sourced from Settings.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Mints probed per batch.
    pub batch_size: usize,
    /// Minimum gap between batch starts.
    pub min_batch_spacing_secs: u64,
    /// Attempts after which a token leaves the queue for good.
    pub attempt_ceiling: u32,
    /// Per-index launch delay inside a batch.
    pub probe_stagger_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: 2,
            min_batch_spacing_secs: 15,
            attempt_ceiling: 10,
            probe_stagger_ms: 500,
        }
    }
}

/// Cheap shape check for queue entries. Full validation happens in the
/// prober; this only keeps garbage from occupying batch slots.
pub fn is_plausible_mint(mint: &str) -> bool {
    if mint.len() < 32 || mint.len() > 44 {
        return false;
    }
    bs58::decode(mint)
        .into_vec()
        .map(|bytes| bytes.len() == 32)
        .unwrap_or(false)
}

/// Queue, backoff and batch watermark for market checking.
///
/// The queue is a set: enqueueing an already-queued mint is a no-op, and
/// iteration order is stable, so batch planning is deterministic.
#[derive(Debug, Default)]
pub struct MarketCheckState {
    queue: BTreeSet<String>,
    backoff_level: u32,
    last_batch_started_at: Option<DateTime<Utc>>,
}

impl MarketCheckState {
    pub fn enqueue(&mut self, mint: &str) -> bool {
        self.queue.insert(mint.to_string())
    }

    pub fn remove(&mut self, mint: &str) -> bool {
        self.queue.remove(mint)
    }

    pub fn contains(&self, mint: &str) -> bool {
        self.queue.contains(mint)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queue_snapshot(&self) -> Vec<String> {
        self.queue.iter().cloned().collect()
    }

    pub fn backoff_level(&self) -> u32 {
        self.backoff_level
    }

    pub fn last_batch_started_at(&self) -> Option<DateTime<Utc>> {
        self.last_batch_started_at
    }

    /// Plan the next probe batch.
    ///
    /// Guard 1: probing is suspended entirely while the backoff level is
    /// above zero. Guard 2: batches must be spaced at least
    /// `min_batch_spacing_secs` apart. Implausible queue entries are dropped
    /// here without consuming batch slots.
    pub fn plan_batch(&mut self, now: DateTime<Utc>, config: &SchedulerConfig) -> Vec<String> {
        self.plan_batch_inner(now, config, false)
    }

    /// Plan a batch for an operator-triggered pass: the spacing guard is
    /// bypassed, the backoff guard is not.
    pub fn plan_batch_forced(&mut self, now: DateTime<Utc>, config: &SchedulerConfig) -> Vec<String> {
        self.plan_batch_inner(now, config, true)
    }

    fn plan_batch_inner(
        &mut self,
        now: DateTime<Utc>,
        config: &SchedulerConfig,
        bypass_spacing: bool,
    ) -> Vec<String> {
        if self.backoff_level > 0 {
            debug!(
                "Probing suspended, backoff level {} (queue: {})",
                self.backoff_level,
                self.queue.len()
            );
            return Vec::new();
        }

        if !bypass_spacing {
            if let Some(last) = self.last_batch_started_at {
                let spacing = Duration::seconds(config.min_batch_spacing_secs as i64);
                if now.signed_duration_since(last) < spacing {
                    debug!("Batch spacing guard active, skipping tick");
                    return Vec::new();
                }
            }
        }

        let implausible: Vec<String> = self
            .queue
            .iter()
            .filter(|m| !is_plausible_mint(m))
            .cloned()
            .collect();
        for mint in &implausible {
            warn!("Dropping implausible queue entry: {}", mint);
            self.queue.remove(mint);
        }

        let batch: Vec<String> = self
            .queue
            .iter()
            .take(config.batch_size.clamp(1, 3))
            .cloned()
            .collect();

        if !batch.is_empty() {
            self.last_batch_started_at = Some(now);
            debug!("Planned batch of {} (queue: {})", batch.len(), self.queue.len());
        }

        batch
    }

    /// One probe finished without infrastructure trouble.
    pub fn record_probe_success(&mut self) {
        if self.backoff_level > 0 {
            info!("Probe succeeded, clearing backoff level {}", self.backoff_level);
        }
        self.backoff_level = 0;
    }

    /// One probe hit rate limiting or transport failure.
    pub fn record_probe_error(&mut self) {
        self.backoff_level += 1;
        info!("Probe error, backoff level now {}", self.backoff_level);
    }

    /// Periodic recovery: one level per interval, never below zero.
    pub fn decay_backoff(&mut self) -> u32 {
        self.backoff_level = self.backoff_level.saturating_sub(1);
        self.backoff_level
    }

    /// Operator override.
    pub fn reset_backoff(&mut self) {
        if self.backoff_level > 0 {
            info!("Backoff level {} reset by operator", self.backoff_level);
        }
        self.backoff_level = 0;
    }

    /// Recompute the queue from the registry: every detected token that is
    /// not resolved available and still under the attempt ceiling belongs in
    /// it, nothing else does. Idempotent. Returns the resulting queue size.
    pub fn repair(&mut self, store: &TokenStore, config: &SchedulerConfig) -> usize {
        self.queue = store
            .detected()
            .iter()
            .filter(|t| t.needs_market_check(config.attempt_ceiling))
            .map(|t| t.mint.clone())
            .collect();
        info!("Queue repaired, {} entries", self.queue.len());
        self.queue.len()
    }
}

/// Fold an ambient probe verdict back into the queue, backoff and registry.
///
/// Returns the resolved status, or None when the token left the registry
/// while its probe was in flight.
pub fn apply_probe_outcome(
    state: &mut MarketCheckState,
    store: &mut TokenStore,
    mint: &str,
    verdict: ProbeVerdict,
    now: DateTime<Utc>,
    config: &SchedulerConfig,
) -> Option<MarketStatus> {
    apply_outcome_inner(state, store, mint, verdict, now, config, true)
}

/// Fold an operator-triggered probe verdict into the registry and queue.
/// The shared backoff level is left alone; it protects the ambient
/// scheduler, not manual checks.
pub fn apply_manual_outcome(
    state: &mut MarketCheckState,
    store: &mut TokenStore,
    mint: &str,
    verdict: ProbeVerdict,
    now: DateTime<Utc>,
    config: &SchedulerConfig,
) -> Option<MarketStatus> {
    apply_outcome_inner(state, store, mint, verdict, now, config, false)
}

fn apply_outcome_inner(
    state: &mut MarketCheckState,
    store: &mut TokenStore,
    mint: &str,
    verdict: ProbeVerdict,
    now: DateTime<Utc>,
    config: &SchedulerConfig,
    adjust_backoff: bool,
) -> Option<MarketStatus> {
    let status = match verdict {
        ProbeVerdict::Available => MarketStatus::Available,
        ProbeVerdict::NotAvailable => MarketStatus::NotAvailable,
        ProbeVerdict::Error => MarketStatus::Error,
    };

    if adjust_backoff {
        match verdict {
            ProbeVerdict::Error => state.record_probe_error(),
            _ => state.record_probe_success(),
        }
    }

    let Some(attempts) = store.apply_probe_verdict(mint, status, now) else {
        // Token was removed while the probe ran; drop the stale queue entry
        state.remove(mint);
        return None;
    };

    if status == MarketStatus::Available {
        info!("Market resolved available for {} after {} attempts", mint, attempts);
        state.remove(mint);
    } else if attempts >= config.attempt_ceiling {
        info!(
            "Giving up on {} after {} attempts (status {})",
            mint,
            attempts,
            status.as_str()
        );
        state.remove(mint);
    }

    Some(status)
}
