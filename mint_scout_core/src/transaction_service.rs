// High-level transaction service - combines RPC calls with parsing

use crate::error::CoreError;
use crate::models::DetectedToken;
use crate::rpc_client::RpcClient;
use crate::tx_parser::extract_initialized_mint;
use chrono::Utc;
use log::{debug, info};

/// Result type for transaction service operations
pub type TxServiceResult<T> = Result<T, CoreError>;

/// Fetch a transaction with bounded retries on rate limiting.
///
/// Only 429-shaped errors are retried, with a linear 250ms-per-attempt
/// backoff. Everything else propagates immediately.
pub async fn fetch_transaction_with_retry<R: RpcClient + ?Sized>(
    signature: &str,
    rpc_client: &R,
    max_retries: u32,
) -> TxServiceResult<serde_json::Value> {
    let mut attempts = 0u32;
    loop {
        attempts += 1;

        match rpc_client.get_transaction(signature).await {
            Ok(Some(tx)) => return Ok(tx),
            Ok(None) => {
                return Err(CoreError::NotFound(format!(
                    "Transaction not found: {}",
                    signature
                )));
            }
            Err(e) => {
                let err_str = format!("{:?}", e);
                if (err_str.contains("Too many requests") || err_str.contains("429"))
                    && attempts < max_retries
                {
                    let backoff_ms = 250 * attempts as u64;
                    debug!(
                        "Rate limited fetching tx {} (attempt {}), backing off {}ms",
                        signature, attempts, backoff_ms
                    );

                    #[cfg(feature = "native")]
                    tokio::time::sleep(std::time::Duration::from_millis(backoff_ms)).await;

                    continue;
                }
                return Err(e);
            }
        }
    }
}

/// Fetch and parse a transaction into a freshly detected token.
///
/// # Returns
/// * `Ok(DetectedToken)` with placeholder identity when the transaction
///   contains an initializeMint instruction
/// * `Err(CoreError)` when the transaction is missing, unparseable, or does
///   not initialize a mint
pub async fn detect_mint_from_signature<R: RpcClient + ?Sized>(
    signature: &str,
    rpc_client: &R,
    max_retries: u32,
) -> TxServiceResult<DetectedToken> {
    debug!("Fetching transaction: {}", signature);

    let transaction_json = fetch_transaction_with_retry(signature, rpc_client, max_retries).await?;

    let mint = extract_initialized_mint(&transaction_json)?;
    info!("New mint {} initialized in tx {}", mint, signature);

    Ok(DetectedToken::new(mint, signature.to_string(), Utc::now()))
}
