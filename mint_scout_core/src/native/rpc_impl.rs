// Native RPC client implementation wrapping solana_client::RpcClient

use crate::error::CoreError;
use crate::rpc_client::{RpcClient as RpcClientTrait, RpcResult};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as Base64Engine, Engine as _};
use log::debug;
use serde_json::{json, Value};
use solana_client::rpc_client::RpcClient as SolanaRpcClient;
use std::sync::Arc;

/// Native RPC client wrapping solana_client::RpcClient
///
/// The wrapped client is blocking, so every call moves onto the blocking
/// thread pool via spawn_blocking.
pub struct NativeRpcClient {
    client: Arc<SolanaRpcClient>,
}

impl NativeRpcClient {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: Arc::new(SolanaRpcClient::new(endpoint)),
        }
    }
}

#[async_trait]
impl RpcClientTrait for NativeRpcClient {
    async fn get_transaction(&self, signature: &str) -> RpcResult<Option<Value>> {
        debug!("Native RPC: get_transaction for {}", signature);

        use solana_client::rpc_config::RpcTransactionConfig;
        use solana_sdk::commitment_config::CommitmentConfig;
        use solana_sdk::signature::Signature;
        use solana_transaction_status::UiTransactionEncoding;
        use std::str::FromStr;

        let signature = Signature::from_str(signature)
            .map_err(|e| CoreError::ParseError(format!("Invalid signature: {}", e)))?;

        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::JsonParsed),
            commitment: Some(CommitmentConfig::confirmed()),
            max_supported_transaction_version: Some(0),
        };

        let client = self.client.clone();
        let tx = tokio::task::spawn_blocking(move || {
            client.get_transaction_with_config(&signature, config)
        })
        .await
        .map_err(|e| CoreError::Rpc(format!("Task join error: {}", e)))?;

        match tx {
            Ok(tx_with_status) => {
                let json = serde_json::to_value(tx_with_status).map_err(CoreError::Json)?;
                Ok(Some(json))
            }
            Err(e) => {
                let err_str = e.to_string();
                // Rate limits must surface as errors so the retry layer sees
                // them; an unknown signature is simply not there yet
                if err_str.contains("429") || err_str.contains("Too many requests") {
                    Err(CoreError::Rpc(format!("get_transaction failed: {}", err_str)))
                } else {
                    Ok(None)
                }
            }
        }
    }

    async fn get_account_info(&self, pubkey: &str) -> RpcResult<Option<Value>> {
        debug!("Native RPC: get_account_info for {}", pubkey);

        use solana_sdk::pubkey::Pubkey;
        use std::str::FromStr;

        let pubkey = Pubkey::from_str(pubkey)
            .map_err(|e| CoreError::ParseError(format!("Invalid pubkey: {}", e)))?;

        let client = self.client.clone();
        let account = tokio::task::spawn_blocking(move || client.get_account(&pubkey))
            .await
            .map_err(|e| CoreError::Rpc(format!("Task join error: {}", e)))?;

        match account {
            Ok(acc) => {
                let data_base64 = Base64Engine.encode(&acc.data);
                let account_json = json!({
                    "data": [data_base64, "base64"],
                    "executable": acc.executable,
                    "lamports": acc.lamports,
                    "owner": acc.owner.to_string(),
                    "rentEpoch": acc.rent_epoch,
                });
                Ok(Some(account_json))
            }
            Err(_) => Ok(None),
        }
    }

    async fn get_version(&self) -> RpcResult<Value> {
        debug!("Native RPC: get_version");

        let client = self.client.clone();
        let version = tokio::task::spawn_blocking(move || client.get_version())
            .await
            .map_err(|e| CoreError::Rpc(format!("Task join error: {}", e)))?
            .map_err(|e| CoreError::Rpc(format!("get_version failed: {}", e)))?;

        Ok(json!({
            "solana-core": version.solana_core,
            "feature-set": version.feature_set,
        }))
    }
}
