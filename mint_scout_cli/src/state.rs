// Shared daemon state threaded through tasks and API handlers

use crate::api::EventLog;
use crate::monitor::MonitorControl;
use log::error;
use mint_scout_core::native::{FileStorage, JupiterQuoteClient, NativeHttpClient, NativeRpcClient};
use mint_scout_core::storage_trait::{keys, StorageBackend};
use mint_scout_core::{
    ConnectionHealth, CoreError, ListenerMetrics, MarketCheckState, Settings, TokenStore,
};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Lock order: any task that needs both `market` and `store` must take
/// `market` first. Mixed orders across concurrent tasks can deadlock.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<Mutex<TokenStore>>,
    pub market: Arc<Mutex<MarketCheckState>>,
    pub health: Arc<Mutex<ConnectionHealth>>,
    pub metrics: Arc<ListenerMetrics>,
    pub storage: Arc<FileStorage>,
    pub rpc: Arc<NativeRpcClient>,
    pub http: Arc<NativeHttpClient>,
    pub quote: Arc<JupiterQuoteClient>,
    pub monitor: Arc<MonitorControl>,
    pub event_log: Arc<EventLog>,
    /// Raw notification channel feeding the main listener loop.
    pub event_tx: mpsc::Sender<String>,
}

impl AppState {
    /// Persist both registries. Locks the store only long enough to snapshot.
    pub async fn persist(&self) -> Result<(), CoreError> {
        let (detected, sniped) = {
            let store = self.store.lock().await;
            (store.detected().to_vec(), store.sniped().to_vec())
        };
        self.storage.save(keys::DETECTED_TOKENS, &detected).await?;
        self.storage.save(keys::SNIPED_TOKENS, &sniped).await?;
        Ok(())
    }

    /// Persist and log instead of propagating; background tasks must not die
    /// over a transient disk error.
    pub async fn persist_or_log(&self) {
        if let Err(e) = self.persist().await {
            error!("Failed to persist token registries: {}", e);
        }
    }
}
