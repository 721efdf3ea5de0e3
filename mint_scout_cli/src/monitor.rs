// Monitoring lifecycle: owns the WebSocket tasks and the liveness flag.
// While the flag is down, the main loop and schedulers drop everything on
// the floor even if a task still manages to deliver a message.

use crate::ws::{run_ws, WsCommand};
use log::{info, warn};
use mint_scout_core::{ConnectionHealth, CoreError, Settings};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

pub struct MonitorControl {
    running: AtomicBool,
    ws_tasks: Mutex<Vec<JoinHandle<()>>>,
    ws_shutdowns: Mutex<Vec<mpsc::Sender<WsCommand>>>,
}

impl MonitorControl {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            ws_tasks: Mutex::new(Vec::new()),
            ws_shutdowns: Mutex::new(Vec::new()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn one subscription task per configured endpoint. Idempotent:
    /// calling start while running is a no-op.
    pub async fn start(
        &self,
        settings: &Settings,
        event_tx: mpsc::Sender<String>,
        health: Arc<Mutex<ConnectionHealth>>,
    ) -> Result<(), CoreError> {
        if self.running.swap(true, Ordering::SeqCst) {
            info!("Monitoring already running");
            return Ok(());
        }

        let mut tasks = self.ws_tasks.lock().await;
        let mut shutdowns = self.ws_shutdowns.lock().await;

        for wss_url in &settings.solana_ws_urls {
            let (shutdown_tx, shutdown_rx) = mpsc::channel::<WsCommand>(1);
            let handle = tokio::spawn({
                let wss_url = wss_url.clone();
                let token_program = settings.token_program.clone();
                let event_tx = event_tx.clone();
                let health = health.clone();
                let subscribe_retries = settings.subscribe_retries;
                async move {
                    if let Err(e) = run_ws(
                        wss_url.clone(),
                        token_program,
                        event_tx,
                        shutdown_rx,
                        subscribe_retries,
                        health,
                    )
                    .await
                    {
                        // The task exiting does not take the process down;
                        // the operator can restart via the API
                        warn!("Subscription task for {} ended: {}", wss_url, e);
                    }
                }
            });
            tasks.push(handle);
            shutdowns.push(shutdown_tx);
        }

        info!("Monitoring started ({} endpoints)", tasks.len());
        Ok(())
    }

    /// Drop the liveness flag first, then unwind the subscription tasks.
    /// Anything already in flight gets discarded by the flag check.
    pub async fn stop(&self, health: Arc<Mutex<ConnectionHealth>>) {
        if !self.running.swap(false, Ordering::SeqCst) {
            info!("Monitoring already stopped");
            return;
        }

        let mut shutdowns = self.ws_shutdowns.lock().await;
        for shutdown_tx in shutdowns.drain(..) {
            let _ = shutdown_tx.send(WsCommand::Shutdown).await;
        }

        let mut tasks = self.ws_tasks.lock().await;
        for mut handle in tasks.drain(..) {
            // Tasks exit on the shutdown command; abort is the backstop for
            // one stuck in connect
            if tokio::time::timeout(std::time::Duration::from_secs(3), &mut handle)
                .await
                .is_err()
            {
                handle.abort();
            }
        }

        health.lock().await.mark_disconnected();
        info!("Monitoring stopped");
    }
}

impl Default for MonitorControl {
    fn default() -> Self {
        Self::new()
    }
}
