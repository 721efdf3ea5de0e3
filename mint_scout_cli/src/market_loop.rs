// Periodic market checking: plans batches off the shared queue, runs
// staggered concurrent probes and folds the verdicts back in.

use crate::state::AppState;
use chrono::Utc;
use log::{debug, error, info};
use mint_scout_core::scheduler::apply_probe_outcome;
use mint_scout_core::{
    probe_market, MarketCheckState, MarketStatus, ProbeVerdict, SchedulerConfig, TokenStore,
};
use std::collections::HashMap;
use tokio::time::Duration;

/// Ambient queue loop. Runs forever; every tick plans at most one batch.
pub async fn run_market_loop(state: AppState) {
    let tick = Duration::from_secs(state.settings.queue_tick_secs);
    loop {
        tokio::time::sleep(tick).await;
        if !state.monitor.is_running() {
            continue;
        }
        run_queue_pass(&state, false).await;
    }
}

/// Periodic backoff recovery: one level per interval while suspended.
pub async fn run_backoff_recovery(state: AppState) {
    let interval = Duration::from_secs(state.settings.backoff_recovery_secs);
    loop {
        tokio::time::sleep(interval).await;
        let mut market = state.market.lock().await;
        if market.backoff_level() > 0 {
            let level = market.decay_backoff();
            info!("Backoff recovered one level, now {}", level);
        }
    }
}

/// Run one queue pass. `force` bypasses the batch spacing guard (operator
/// trigger); the backoff guard always applies. Returns the batch size.
pub async fn run_queue_pass(state: &AppState, force: bool) -> usize {
    let scheduler_config = state.settings.scheduler_config();
    let now = Utc::now();

    let batch = {
        let mut market = state.market.lock().await;
        if force {
            market.plan_batch_forced(now, &scheduler_config)
        } else {
            market.plan_batch(now, &scheduler_config)
        }
    };
    if batch.is_empty() {
        return 0;
    }
    debug!("Probing batch of {}: {:?}", batch.len(), batch);

    // Remember what each batch member looked like before marking it, so a
    // stop mid-flight can put it back
    let prior_status: HashMap<String, MarketStatus> = {
        let mut store = state.store.lock().await;
        let mut prior = HashMap::with_capacity(batch.len());
        for mint in &batch {
            if let Some(token) = store.get(mint) {
                prior.insert(mint.clone(), token.market_status);
            }
            store.set_status(mint, MarketStatus::Checking);
        }
        prior
    };

    // Launch the whole batch concurrently, staggered by index so the quote
    // API sees a spread rather than a burst
    let mut handles = Vec::with_capacity(batch.len());
    for (index, mint) in batch.iter().cloned().enumerate() {
        let quote = state.quote.clone();
        let probe_config = state.settings.probe_config();
        let stagger_ms = scheduler_config.probe_stagger_ms * index as u64;
        handles.push(tokio::spawn(async move {
            if stagger_ms > 0 {
                tokio::time::sleep(Duration::from_millis(stagger_ms)).await;
            }
            let verdict = probe_market(&mint, quote.as_ref(), &probe_config).await;
            (mint, verdict)
        }));
    }

    let mut results = Vec::with_capacity(batch.len());
    for handle in handles {
        match handle.await {
            Ok(result) => results.push(result),
            Err(e) => error!("Probe task panicked: {}", e),
        }
    }

    // Lock order everywhere in the daemon: market before store
    let discard = !state.monitor.is_running();
    {
        let mut market = state.market.lock().await;
        let mut store = state.store.lock().await;
        fold_batch(
            &mut market,
            &mut store,
            results,
            &prior_status,
            discard,
            &scheduler_config,
        );
    }

    state.persist_or_log().await;
    batch.len()
}

/// Fold finished probes back into the queue and registry. When monitoring
/// was stopped mid-batch the verdicts are discarded and every member reverts
/// to its pre-batch status instead of sticking at checking.
pub(crate) fn fold_batch(
    market: &mut MarketCheckState,
    store: &mut TokenStore,
    results: Vec<(String, ProbeVerdict)>,
    prior_status: &HashMap<String, MarketStatus>,
    discard: bool,
    config: &SchedulerConfig,
) {
    for (mint, verdict) in results {
        if discard {
            let restored = prior_status
                .get(&mint)
                .copied()
                .unwrap_or(MarketStatus::Pending);
            store.set_status(&mint, restored);
            continue;
        }
        apply_probe_outcome(market, store, &mint, verdict, Utc::now(), config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mint_scout_core::DetectedToken;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    const MINT_A: &str = "4k3Dyjzvzp8eMZWUXbBCjEvwSKkk59S5iCNLY3QrkX6R";

    fn detected(mint: &str) -> DetectedToken {
        DetectedToken::new(mint.to_string(), format!("sig-{}", mint), Utc::now())
    }

    #[test]
    fn test_fold_applies_verdicts() {
        let mut store = TokenStore::default();
        store.insert_detected(detected(MINT_A));
        store.set_status(MINT_A, MarketStatus::Checking);
        let mut market = MarketCheckState::default();
        market.enqueue(MINT_A);

        fold_batch(
            &mut market,
            &mut store,
            vec![(MINT_A.to_string(), ProbeVerdict::Available)],
            &HashMap::new(),
            false,
            &SchedulerConfig::default(),
        );

        assert_eq!(
            store.get(MINT_A).unwrap().market_status,
            MarketStatus::Available
        );
        assert!(!market.contains(MINT_A));
    }

    #[test]
    fn test_discarded_batch_reverts_checking_status() {
        let mut store = TokenStore::default();
        let mut token = detected(MINT_A);
        token.market_status = MarketStatus::NotAvailable;
        token.check_attempts = 2;
        store.insert_detected(token);

        let mut market = MarketCheckState::default();
        market.enqueue(MINT_A);

        let mut prior = HashMap::new();
        prior.insert(MINT_A.to_string(), MarketStatus::NotAvailable);
        store.set_status(MINT_A, MarketStatus::Checking);

        fold_batch(
            &mut market,
            &mut store,
            vec![(MINT_A.to_string(), ProbeVerdict::Available)],
            &prior,
            true,
            &SchedulerConfig::default(),
        );

        // No checking leftovers, no attempt charged, still queued
        let token = store.get(MINT_A).unwrap();
        assert_eq!(token.market_status, MarketStatus::NotAvailable);
        assert_eq!(token.check_attempts, 2);
        assert!(market.contains(MINT_A));
    }

    #[test]
    fn test_discarded_member_without_prior_reverts_to_pending() {
        let mut store = TokenStore::default();
        store.insert_detected(detected(MINT_A));
        store.set_status(MINT_A, MarketStatus::Checking);
        let mut market = MarketCheckState::default();

        fold_batch(
            &mut market,
            &mut store,
            vec![(MINT_A.to_string(), ProbeVerdict::Error)],
            &HashMap::new(),
            true,
            &SchedulerConfig::default(),
        );

        assert_eq!(
            store.get(MINT_A).unwrap().market_status,
            MarketStatus::Pending
        );
    }

    // Both daemon lock users, detection-style inserts and batch folds, take
    // market before store. Mixed orders here would wedge within the timeout.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_market_store_lock_order_never_deadlocks() {
        let market = Arc::new(Mutex::new(MarketCheckState::default()));
        let store = Arc::new(Mutex::new(TokenStore::default()));

        let mut tasks = Vec::new();
        for task_id in 0..3 {
            let market = market.clone();
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                for n in 0..200 {
                    let mut market = market.lock().await;
                    let mut store = store.lock().await;
                    let mint = format!("mint-{}-{}", task_id, n);
                    if store.insert_detected(DetectedToken::new(
                        mint.clone(),
                        "sig".to_string(),
                        Utc::now(),
                    )) {
                        market.enqueue(&mint);
                    }
                }
            }));
        }
        {
            let market = market.clone();
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                for n in 0..200 {
                    let mut market = market.lock().await;
                    let mut store = store.lock().await;
                    fold_batch(
                        &mut market,
                        &mut store,
                        vec![(format!("mint-0-{}", n), ProbeVerdict::Error)],
                        &HashMap::new(),
                        false,
                        &SchedulerConfig::default(),
                    );
                }
            }));
        }

        let all = async {
            for task in tasks {
                task.await.unwrap();
            }
        };
        tokio::time::timeout(Duration::from_secs(5), all)
            .await
            .expect("lock acquisition stalled");
    }
}
