// Mint Scout daemon: subscribes to token-program logs, registers new mints
// and schedules market checks against the quote API.

mod api;
mod market_loop;
mod monitor;
mod state;
mod ws;

use crate::api::EventLog;
use crate::monitor::MonitorControl;
use crate::state::AppState;
use chrono::Utc;
use log::{debug, error, info, warn};
use lru::LruCache;
use mint_scout_core::native::{FileStorage, JupiterQuoteClient, NativeHttpClient, NativeRpcClient};
use mint_scout_core::storage_trait::{keys, StorageBackend};
use mint_scout_core::{
    detect_mint_from_signature, fetch_token_identity, ConnectionHealth, CoreError, DetectedToken,
    EventDisposition, HttpClient, MarketCheckState, MintListener, RpcClient, Settings, SnipedToken,
    TokenStore,
};
use once_cell::sync::OnceCell;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Duration;

static EVENT_LOG: OnceCell<Arc<EventLog>> = OnceCell::new();

/// Push an entry onto the API event log from anywhere in the daemon.
/// Fire-and-forget; the ring buffer is capped so this never grows unbounded.
macro_rules! scout_log {
    ($level:expr, $($arg:tt)*) => {
        if let Some(event_log) = EVENT_LOG.get() {
            let event_log = event_log.clone();
            let message = format!($($arg)*);
            tokio::spawn(async move {
                event_log.push($level, message, None).await;
            });
        }
    };
}

#[tokio::main(worker_threads = 4)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    println!("Mint Scout starting up");

    let config_path =
        std::env::var("MINT_SCOUT_CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    let settings = Arc::new(Settings::from_file(&config_path)?);
    settings.validate()?;
    info!("Configuration loaded from {}", config_path);

    let storage = Arc::new(FileStorage::new(PathBuf::from(&settings.storage_dir)));
    let detected: Vec<DetectedToken> = storage
        .load(keys::DETECTED_TOKENS)
        .await?
        .unwrap_or_default();
    let sniped: Vec<SnipedToken> = storage.load(keys::SNIPED_TOKENS).await?.unwrap_or_default();
    info!(
        "Hydrated registries: {} detected, {} sniped",
        detected.len(),
        sniped.len()
    );
    let store = Arc::new(Mutex::new(TokenStore::from_parts(detected, sniped)));

    // Rebuild the queue from whatever survived the restart
    let market = {
        let mut market = MarketCheckState::default();
        let store = store.lock().await;
        market.repair(&store, &settings.scheduler_config());
        Arc::new(Mutex::new(market))
    };

    let rpc_url = settings
        .solana_rpc_urls
        .first()
        .cloned()
        .ok_or_else(|| CoreError::Validation("solana_rpc_urls must not be empty".to_string()))?;
    let rpc = Arc::new(NativeRpcClient::new(rpc_url));
    let http = Arc::new(NativeHttpClient::with_timeout(Duration::from_secs(
        settings.metadata_timeout_secs,
    ))?);
    let quote = Arc::new(JupiterQuoteClient::new(
        settings.quote_api_url.clone(),
        Duration::from_secs(settings.quote_timeout_secs),
    )?);

    let health = Arc::new(Mutex::new(ConnectionHealth::new(
        settings.reachability_failure_threshold,
    )));
    let mut listener = MintListener::new(settings.listener_config());
    let metrics = listener.metrics();

    let (event_tx, mut event_rx) = mpsc::channel::<String>(1000);
    let monitor = Arc::new(MonitorControl::new());
    let event_log = Arc::new(EventLog::new());
    let _ = EVENT_LOG.set(event_log.clone());

    let state = AppState {
        settings: settings.clone(),
        store: store.clone(),
        market: market.clone(),
        health: health.clone(),
        metrics: metrics.clone(),
        storage: storage.clone(),
        rpc: rpc.clone(),
        http: http.clone(),
        quote: quote.clone(),
        monitor: monitor.clone(),
        event_log: event_log.clone(),
        event_tx: event_tx.clone(),
    };

    let cache_capacity = NonZeroUsize::new(settings.seen_cache_capacity)
        .ok_or_else(|| CoreError::Validation("seen_cache_capacity must be > 0".to_string()))?;
    let mut seen_signatures: LruCache<String, ()> = LruCache::new(cache_capacity);

    monitor
        .start(&settings, event_tx.clone(), health.clone())
        .await?;
    scout_log!("info", "Monitoring started at boot");

    tokio::spawn(market_loop::run_market_loop(state.clone()));
    tokio::spawn(market_loop::run_backoff_recovery(state.clone()));

    // Heartbeat: periodic proof of life while monitoring is on
    {
        let state = state.clone();
        tokio::spawn(async move {
            let interval = Duration::from_secs(state.settings.heartbeat_secs);
            loop {
                tokio::time::sleep(interval).await;
                if !state.monitor.is_running() {
                    continue;
                }
                let count = state.health.lock().await.record_heartbeat(Utc::now());
                let snapshot = state.metrics.snapshot();
                info!(
                    "Heartbeat #{}: {} received, {} detected",
                    count, snapshot.total_received, snapshot.tokens_detected
                );
            }
        });
    }

    // Reachability poll: drives the flap-damped connected flag
    {
        let state = state.clone();
        tokio::spawn(async move {
            let interval = Duration::from_secs(state.settings.reachability_check_secs);
            loop {
                tokio::time::sleep(interval).await;
                let reachable = matches!(
                    tokio::time::timeout(Duration::from_secs(5), state.rpc.get_version()).await,
                    Ok(Ok(_))
                );
                let changed = state.health.lock().await.record_reachability(reachable);
                if changed {
                    scout_log!(
                        if reachable { "info" } else { "warn" },
                        "RPC reachability changed: {}",
                        if reachable { "reachable" } else { "unreachable" }
                    );
                }
            }
        });
    }

    // Metrics summary
    {
        let metrics = metrics.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(60)).await;
                metrics.log_summary();
            }
        });
    }

    // Control API
    {
        let state = state.clone();
        let port = settings.api_port;
        tokio::spawn(async move {
            let addr = format!("0.0.0.0:{}", port);
            let tcp = match tokio::net::TcpListener::bind(&addr).await {
                Ok(l) => l,
                Err(e) => {
                    error!("Could not bind control API on {}: {}", addr, e);
                    return;
                }
            };
            info!("Control API listening on {}", addr);
            if let Err(e) = axum::serve(tcp, api::create_router(state)).await {
                error!("Control API stopped: {}", e);
            }
        });
    }

    // ---------- main detection loop ----------
    while let Some(text) = event_rx.recv().await {
        if !monitor.is_running() {
            // A task may deliver one last message during shutdown
            continue;
        }

        let json: Value = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(e) => {
                debug!("Discarding unparseable notification: {}", e);
                continue;
            }
        };

        let signature = match listener.evaluate_notification(&json) {
            Ok(EventDisposition::Process(sig)) => sig,
            Ok(_) => continue,
            Err(e) => {
                debug!("Notification rejected: {}", e);
                continue;
            }
        };

        if seen_signatures.put(signature.clone(), ()).is_some() {
            metrics.record_duplicate();
            continue;
        }

        let token =
            match detect_mint_from_signature(&signature, rpc.as_ref(), settings.tx_fetch_retries)
                .await
            {
                Ok(token) => token,
                Err(e) => {
                    metrics.record_failure();
                    warn!("Detection failed for {}: {}", signature, e);
                    continue;
                }
            };

        let mint = token.mint.clone();
        let name = token.name.clone();
        let inserted = {
            // Lock order: market before store, as everywhere in the daemon
            let mut market = market.lock().await;
            let mut store = store.lock().await;
            let inserted = store.insert_detected(token);
            if inserted {
                market.enqueue(&mint);
            }
            inserted
        };

        if !inserted {
            metrics.record_duplicate();
            continue;
        }

        metrics.record_detected();
        info!("Detected new token {} ({})", mint, name);
        scout_log!("info", "Detected new token {} ({})", mint, name);
        state.persist_or_log().await;

        // Identity refinement happens off the loop; the placeholder stands
        // until it resolves
        {
            let state = state.clone();
            let mint = mint.clone();
            tokio::spawn(async move {
                let refined = refine_identity_later(
                    &state.store,
                    &mint,
                    &state.settings.metadata_program,
                    state.rpc.as_ref(),
                    state.http.as_ref(),
                    Duration::from_secs(state.settings.metadata_timeout_secs),
                )
                .await;
                if refined {
                    state.persist_or_log().await;
                }
            });
        }
    }

    info!("Event channel closed, shutting down");
    Ok(())
}

/// Fetch metadata for an already-registered mint and fold name/symbol into
/// the registry. Returns whether anything changed; failures and timeouts
/// leave the placeholder identity in place.
async fn refine_identity_later<R, H>(
    store: &Mutex<TokenStore>,
    mint: &str,
    metadata_program: &str,
    rpc: &R,
    http: &H,
    timeout: Duration,
) -> bool
where
    R: RpcClient + ?Sized,
    H: HttpClient + ?Sized,
{
    let identity = match tokio::time::timeout(
        timeout,
        fetch_token_identity(mint, metadata_program, rpc, http),
    )
    .await
    {
        Ok(Ok(identity)) => identity,
        Ok(Err(e)) => {
            debug!("No metadata for {}: {}", mint, e);
            return false;
        }
        Err(_) => {
            debug!("Metadata fetch timed out for {}", mint);
            return false;
        }
    };

    let refined = store.lock().await.refine_identity(
        mint,
        identity.name.as_deref(),
        identity.symbol.as_deref(),
    );
    if refined {
        info!("Refined identity for {}", mint);
    }
    refined
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mint_scout_core::RpcResult;

    const TEST_MINT: &str = "6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P";
    const METADATA_PROGRAM: &str = "metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s";

    struct NoMetadataRpc;

    #[async_trait]
    impl RpcClient for NoMetadataRpc {
        async fn get_transaction(&self, _signature: &str) -> RpcResult<Option<Value>> {
            Ok(None)
        }

        async fn get_account_info(&self, _pubkey: &str) -> RpcResult<Option<Value>> {
            Ok(None)
        }

        async fn get_version(&self) -> RpcResult<Value> {
            Ok(serde_json::json!({}))
        }
    }

    struct StalledRpc;

    #[async_trait]
    impl RpcClient for StalledRpc {
        async fn get_transaction(&self, _signature: &str) -> RpcResult<Option<Value>> {
            Ok(None)
        }

        async fn get_account_info(&self, _pubkey: &str) -> RpcResult<Option<Value>> {
            std::future::pending().await
        }

        async fn get_version(&self) -> RpcResult<Value> {
            Ok(serde_json::json!({}))
        }
    }

    struct NoopHttp;

    #[async_trait]
    impl HttpClient for NoopHttp {
        async fn fetch_text(&self, _url: &str) -> Result<String, CoreError> {
            Err(CoreError::NotFound("no body".to_string()))
        }
    }

    fn store_with_placeholder() -> Mutex<TokenStore> {
        let mut store = TokenStore::default();
        store.insert_detected(DetectedToken::new(
            TEST_MINT.to_string(),
            "sig".to_string(),
            Utc::now(),
        ));
        Mutex::new(store)
    }

    #[tokio::test]
    async fn test_missing_metadata_keeps_placeholder() {
        let store = store_with_placeholder();
        let refined = refine_identity_later(
            &store,
            TEST_MINT,
            METADATA_PROGRAM,
            &NoMetadataRpc,
            &NoopHttp,
            Duration::from_secs(1),
        )
        .await;
        assert!(!refined);

        let store = store.lock().await;
        let token = store.get(TEST_MINT).unwrap();
        assert_eq!(token.name, "Token-6EF8rrec");
        assert_eq!(token.symbol, "NEW");
    }

    #[tokio::test]
    async fn test_stalled_metadata_fetch_times_out_and_keeps_placeholder() {
        let store = store_with_placeholder();
        let refined = refine_identity_later(
            &store,
            TEST_MINT,
            METADATA_PROGRAM,
            &StalledRpc,
            &NoopHttp,
            Duration::from_millis(20),
        )
        .await;
        assert!(!refined);
        assert_eq!(store.lock().await.get(TEST_MINT).unwrap().symbol, "NEW");
    }
}
