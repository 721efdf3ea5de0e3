// RPC client abstraction

use crate::error::CoreError;
use async_trait::async_trait;
use serde_json::Value;

/// Result type for RPC operations
pub type RpcResult<T> = Result<T, CoreError>;

/// Abstract RPC client trait
///
/// Transactions and accounts are exchanged as jsonParsed-style JSON values,
/// which keeps the parsing layer independent of any concrete client type.
#[async_trait]
pub trait RpcClient: Send + Sync {
    /// Fetch a confirmed transaction by signature. None when the node does
    /// not know the signature (yet).
    async fn get_transaction(&self, signature: &str) -> RpcResult<Option<Value>>;

    /// Fetch account info for a pubkey. None when the account does not exist.
    async fn get_account_info(&self, pubkey: &str) -> RpcResult<Option<Value>>;

    /// Node version info; used as a lightweight reachability check.
    async fn get_version(&self) -> RpcResult<Value>;
}
