// WebSocket subscription task: one per configured endpoint.
// Subscribes to token-program logs and forwards raw notification text into
// the main processing channel.

use futures_util::{stream::StreamExt, SinkExt};
use log::{debug, error, info, warn};
use mint_scout_core::{ConnectionHealth, CoreError};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Debug)]
pub enum WsCommand {
    Shutdown,
}

pub async fn run_ws(
    wss_url: String,
    token_program: String,
    tx: mpsc::Sender<String>,
    mut control_rx: mpsc::Receiver<WsCommand>,
    subscribe_retries: u32,
    health: Arc<Mutex<ConnectionHealth>>,
) -> Result<(), CoreError> {
    let mut setup_failures = 0u32;

    // ---------- outer re-connect loop ----------
    loop {
        let (ws_stream, _) = match connect_async(&wss_url).await {
            Ok(s) => s,
            Err(e) => {
                setup_failures += 1;
                if setup_failures >= subscribe_retries {
                    error!(
                        "WSS {} failed {} times in a row, giving up: {}",
                        wss_url, setup_failures, e
                    );
                    health.lock().await.mark_disconnected();
                    return Err(CoreError::WebSocket(format!(
                        "Could not establish subscription to {}: {}",
                        wss_url, e
                    )));
                }
                let delay_secs = (2 * setup_failures as u64).min(30);
                warn!(
                    "WSS {} connect failed (attempt {}), retrying in {}s: {}",
                    wss_url, setup_failures, delay_secs, e
                );
                tokio::time::sleep(Duration::from_secs(delay_secs)).await;
                continue;
            }
        };
        let (mut write, mut read) = ws_stream.split();

        info!("Subscribing to token program logs on {}", wss_url);
        let subscribe_msg = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "logsSubscribe",
            "params": [
                { "mentions": [ &token_program ] },
                { "commitment": "confirmed" }
            ]
        });
        if let Err(e) = write.send(Message::Text(subscribe_msg.to_string())).await {
            warn!("WSS {} subscribe send failed, reconnecting: {}", wss_url, e);
            tokio::time::sleep(Duration::from_secs(2)).await;
            continue;
        }

        setup_failures = 0;
        let mut subscription_id: Option<u64> = None;

        // ---------- inner event loop ----------
        loop {
            tokio::select! {
                msg = read.next() => {
                    let msg = match msg {
                        Some(Ok(m)) => m,
                        Some(Err(e)) => { error!("WS read error on {}: {}", wss_url, e); break; }
                        None => { error!("WS stream ended on {}", wss_url); break; }
                    };

                    let text = match msg {
                        Message::Text(t) => t,
                        Message::Close(_) => { warn!("WS close frame from {}", wss_url); break; }
                        _ => continue,
                    };

                    let value: Value = match serde_json::from_str(&text) {
                        Ok(v) => v,
                        Err(e) => { debug!("JSON parse error: {}", e); continue; }
                    };

                    // The subscribe ack carries our request id and the
                    // subscription id we need for a clean unsubscribe. Only
                    // an acked subscription counts as connected.
                    if value.get("id").and_then(|v| v.as_i64()) == Some(1) {
                        subscription_id = value.get("result").and_then(|r| r.as_u64());
                        health.lock().await.mark_connected();
                        debug!("Log subscription confirmed on {}: {:?}", wss_url, subscription_id);
                        continue;
                    }

                    // Only notifications carry params; forward those
                    if value.get("params").is_some() {
                        if tx.send(text).await.is_err() {
                            // Receiver gone, the process is shutting down
                            return Ok(());
                        }
                    }
                }

                cmd = control_rx.recv() => {
                    match cmd {
                        Some(WsCommand::Shutdown) | None => {
                            if let Some(sub_id) = subscription_id {
                                // An already-torn-down subscription counts as
                                // unsubscribed; ignore the send result
                                let unsubscribe_msg = json!({
                                    "jsonrpc": "2.0",
                                    "id": 2,
                                    "method": "logsUnsubscribe",
                                    "params": [ sub_id ]
                                });
                                let _ = write.send(Message::Text(unsubscribe_msg.to_string())).await;
                            }
                            let _ = write.send(Message::Close(None)).await;
                            info!("Log subscription on {} closed", wss_url);
                            return Ok(());
                        }
                    }
                }
            }
        }

        warn!("WSS {} disconnected, reconnecting in 2s", wss_url);
        health.lock().await.mark_disconnected();
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mint_scout_core::ConnectionHealth;
    use tokio_tungstenite::accept_async;

    #[tokio::test]
    async fn test_connected_only_after_subscription_ack() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (event_tx, _event_rx) = mpsc::channel::<String>(16);
        let (control_tx, control_rx) = mpsc::channel::<WsCommand>(1);
        let health = Arc::new(Mutex::new(ConnectionHealth::new(3)));

        // Fake endpoint: accept the socket, read the subscribe request, then
        // hand the stream back so the test controls when the ack goes out
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let frame = ws.next().await.unwrap().unwrap();
            let request: Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
            assert_eq!(request["method"], "logsSubscribe");
            ws
        });

        let client = tokio::spawn(run_ws(
            format!("ws://{}", addr),
            "TokenProgram".to_string(),
            event_tx,
            control_rx,
            3,
            health.clone(),
        ));

        let mut ws = server.await.unwrap();

        // Subscribe request is out, the ack is not: still disconnected
        assert!(!health.lock().await.is_connected());

        ws.send(Message::Text(
            json!({"jsonrpc": "2.0", "id": 1, "result": 7}).to_string(),
        ))
        .await
        .unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
        while !health.lock().await.is_connected() {
            assert!(
                tokio::time::Instant::now() < deadline,
                "never marked connected after ack"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        // Shutdown unsubscribes with the acked subscription id
        control_tx.send(WsCommand::Shutdown).await.unwrap();
        let frame = ws.next().await.unwrap().unwrap();
        let request: Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
        assert_eq!(request["method"], "logsUnsubscribe");
        assert_eq!(request["params"][0], 7);

        let result = tokio::time::timeout(Duration::from_secs(3), client)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
