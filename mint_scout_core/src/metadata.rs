// Token identity refinement - platform agnostic interface
// Replaces placeholder names with Metaplex metadata when it exists

use crate::error::CoreError;
use crate::rpc_client::RpcClient;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as Base64Engine, Engine as _};
use log::{debug, warn};
use mpl_token_metadata::accounts::Metadata;
use solana_program::pubkey::Pubkey;
use std::str::FromStr;

/// Result type for metadata operations
pub type MetadataResult<T> = Result<T, CoreError>;

/// Abstract HTTP client trait for fetching off-chain metadata
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Fetch text content from a URL
    async fn fetch_text(&self, url: &str) -> MetadataResult<String>;
}

/// Name and symbol resolved for a mint, as far as fetching got.
#[derive(Debug, Clone, Default)]
pub struct TokenIdentity {
    pub name: Option<String>,
    pub symbol: Option<String>,
}

/// Compute metadata PDA for a mint
pub fn compute_metadata_pda(mint: &str, metadata_program: &str) -> MetadataResult<String> {
    let metadata_program_pk = Pubkey::from_str(metadata_program)
        .map_err(|e| CoreError::ParseError(format!("Invalid metadata program: {}", e)))?;
    let mint_pk = Pubkey::from_str(mint)
        .map_err(|e| CoreError::ParseError(format!("Invalid mint: {}", e)))?;

    let (metadata_pda, _) = Pubkey::find_program_address(
        &[b"metadata", metadata_program_pk.as_ref(), mint_pk.as_ref()],
        &metadata_program_pk,
    );

    Ok(metadata_pda.to_string())
}

/// Parse on-chain metadata from account data
pub fn parse_onchain_metadata(account_data: &[u8]) -> MetadataResult<Metadata> {
    Metadata::safe_deserialize(account_data)
        .map_err(|e| CoreError::ParseError(format!("Failed to deserialize metadata: {}", e)))
}

/// Decode account data from RPC response
pub fn decode_account_data(account_info: &serde_json::Value) -> MetadataResult<Vec<u8>> {
    // Normalize: some RPC implementations put the account under result.value
    let account_obj = if let Some(v) = account_info.get("value") {
        v
    } else {
        account_info
    };

    let base64_str = account_obj
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|arr| arr.first())
        .and_then(|v| v.as_str())
        .ok_or_else(|| CoreError::ParseError("No data field in account info".to_string()))?;

    Base64Engine
        .decode(base64_str)
        .map_err(|e| CoreError::ParseError(format!("Failed to decode base64 account data: {}", e)))
}

// On-chain metadata strings are fixed-width, padded with NULs.
fn trim_padded(s: &str) -> Option<String> {
    let trimmed = s.trim_end_matches('\u{0}').trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Pull name/symbol out of an off-chain metadata JSON document.
pub fn parse_offchain_identity(json_str: &str) -> MetadataResult<TokenIdentity> {
    let body: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| CoreError::ParseError(format!("Failed to parse metadata JSON: {}", e)))?;

    Ok(TokenIdentity {
        name: body
            .get("name")
            .and_then(|v| v.as_str())
            .and_then(trim_padded),
        symbol: body
            .get("symbol")
            .and_then(|v| v.as_str())
            .and_then(trim_padded),
    })
}

/// Fetch the best available identity for a mint.
///
/// On-chain metadata wins by default; when it carries an http(s) URI the
/// off-chain document may refine name and symbol further. Failures on the
/// off-chain leg degrade to the on-chain values, not to an error.
pub async fn fetch_token_identity<R: RpcClient + ?Sized, H: HttpClient + ?Sized>(
    mint: &str,
    metadata_program: &str,
    rpc_client: &R,
    http_client: &H,
) -> MetadataResult<TokenIdentity> {
    let metadata_pda = compute_metadata_pda(mint, metadata_program)?;
    debug!("Metadata PDA for {}: {}", mint, metadata_pda);

    let account_info = rpc_client
        .get_account_info(&metadata_pda)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("No metadata account for mint {}", mint)))?;

    let account_data = decode_account_data(&account_info)?;
    let onchain = parse_onchain_metadata(&account_data)?;

    let mut identity = TokenIdentity {
        name: trim_padded(&onchain.name),
        symbol: trim_padded(&onchain.symbol),
    };

    let uri = onchain.uri.trim_end_matches('\u{0}').trim();
    if uri.starts_with("http://") || uri.starts_with("https://") {
        match http_client.fetch_text(uri).await {
            Ok(body) => match parse_offchain_identity(&body) {
                Ok(offchain) => {
                    if offchain.name.is_some() {
                        identity.name = offchain.name;
                    }
                    if offchain.symbol.is_some() {
                        identity.symbol = offchain.symbol;
                    }
                }
                Err(e) => debug!("Unusable off-chain metadata for {}: {:?}", mint, e),
            },
            Err(e) => warn!("Failed to fetch off-chain metadata for {} from {}: {:?}", mint, uri, e),
        }
    }

    Ok(identity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_offchain_identity_basic() {
        let json = r#"{"name": "Test Token", "symbol": "TEST", "description": "ignored"}"#;
        let identity = parse_offchain_identity(json).unwrap();
        assert_eq!(identity.name, Some("Test Token".to_string()));
        assert_eq!(identity.symbol, Some("TEST".to_string()));
    }

    #[test]
    fn test_parse_offchain_identity_missing_fields() {
        let identity = parse_offchain_identity(r#"{"image": "x.png"}"#).unwrap();
        assert!(identity.name.is_none());
        assert!(identity.symbol.is_none());
    }

    #[test]
    fn test_parse_offchain_identity_invalid_json() {
        assert!(parse_offchain_identity("not json").is_err());
    }

    #[test]
    fn test_trim_padded() {
        assert_eq!(trim_padded("ABC\u{0}\u{0}\u{0}"), Some("ABC".to_string()));
        assert_eq!(trim_padded("\u{0}\u{0}"), None);
        assert_eq!(trim_padded("  "), None);
    }

    #[test]
    fn test_compute_metadata_pda_rejects_garbage() {
        assert!(compute_metadata_pda("not-a-mint", "also-not-a-program").is_err());
    }

    #[test]
    fn test_decode_account_data() {
        let account = serde_json::json!({
            "data": [Base64Engine.encode(b"hello"), "base64"],
            "lamports": 1
        });
        assert_eq!(decode_account_data(&account).unwrap(), b"hello");
    }

    #[test]
    fn test_decode_account_data_under_value() {
        let account = serde_json::json!({
            "value": {
                "data": [Base64Engine.encode(b"nested"), "base64"]
            }
        });
        assert_eq!(decode_account_data(&account).unwrap(), b"nested");
    }

    #[test]
    fn test_decode_account_data_missing_field() {
        let account = serde_json::json!({"lamports": 1});
        assert!(decode_account_data(&account).is_err());
    }
}
