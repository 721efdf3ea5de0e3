// Transaction parsing - platform agnostic
// Extracts the initialized mint from jsonParsed Solana transactions

use crate::error::CoreError;
use log::debug;
use serde_json::Value;

/// Parsed instruction types that create a new mint account
pub const INIT_MINT_TYPES: &[&str] = &["initializeMint", "initializeMint2"];

/// Attempts to read a mint address out of one jsonParsed instruction.
///
/// Only spl-token instructions of an initializeMint variant qualify; the
/// parsed payload then carries the mint under `info.mint`.
fn try_extract_init_mint(instr: &Value) -> Option<String> {
    let program = instr.get("program").and_then(|p| p.as_str())?;
    if program != "spl-token" {
        return None;
    }

    let parsed = instr.get("parsed")?;
    let kind = parsed.get("type").and_then(|t| t.as_str())?;
    if !INIT_MINT_TYPES.contains(&kind) {
        return None;
    }

    parsed
        .get("info")
        .and_then(|i| i.get("mint"))
        .and_then(|m| m.as_str())
        .map(|s| s.to_string())
}

/// Parse transaction JSON to find the initialized mint.
///
/// Searches main instructions first, then inner instructions for the CPI
/// case where the token program is invoked by another program.
///
/// # Returns
/// * `Ok(mint)` when an initializeMint instruction is found
/// * `Err(CoreError::NotFound)` when the transaction has none
pub fn extract_initialized_mint(transaction_json: &Value) -> Result<String, CoreError> {
    if let Some(instructions) = transaction_json
        .get("transaction")
        .and_then(|t| t.get("message"))
        .and_then(|m| m.get("instructions"))
        .and_then(|i| i.as_array())
    {
        for instr in instructions {
            if let Some(mint) = try_extract_init_mint(instr) {
                debug!("initializeMint in main instructions: {}", mint);
                return Ok(mint);
            }
        }
    }

    if let Some(inner_instructions) = transaction_json
        .get("meta")
        .and_then(|m| m.get("innerInstructions"))
        .and_then(|v| v.as_array())
    {
        for inner in inner_instructions {
            if let Some(instructions) = inner.get("instructions").and_then(|v| v.as_array()) {
                for instr in instructions {
                    if let Some(mint) = try_extract_init_mint(instr) {
                        debug!("initializeMint in inner instructions: {}", mint);
                        return Ok(mint);
                    }
                }
            }
        }
    }

    debug!("No initializeMint instruction found in transaction");
    Err(CoreError::NotFound(
        "No initializeMint instruction in transaction".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn init_mint_instruction(kind: &str, mint: &str) -> Value {
        json!({
            "program": "spl-token",
            "programId": "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA",
            "parsed": {
                "type": kind,
                "info": {
                    "mint": mint,
                    "decimals": 6,
                    "mintAuthority": "AuthAuthAuthAuthAuthAuthAuthAuthAuthAuthAuth"
                }
            }
        })
    }

    fn tx_with_main_instructions(instructions: Vec<Value>) -> Value {
        json!({
            "transaction": {
                "message": {
                    "instructions": instructions
                }
            },
            "meta": { "err": null }
        })
    }

    #[test]
    fn test_extract_from_main_instructions() {
        let tx = tx_with_main_instructions(vec![
            json!({"program": "system", "parsed": {"type": "createAccount", "info": {}}}),
            init_mint_instruction("initializeMint", "Mint1111"),
        ]);
        assert_eq!(extract_initialized_mint(&tx).unwrap(), "Mint1111");
    }

    #[test]
    fn test_extract_initialize_mint2() {
        let tx = tx_with_main_instructions(vec![init_mint_instruction("initializeMint2", "Mint2222")]);
        assert_eq!(extract_initialized_mint(&tx).unwrap(), "Mint2222");
    }

    #[test]
    fn test_extract_from_inner_instructions() {
        let tx = json!({
            "transaction": {
                "message": {
                    "instructions": [
                        {"programId": "LauncherProgram1111111111111111111111111111", "accounts": [], "data": "abc"}
                    ]
                }
            },
            "meta": {
                "err": null,
                "innerInstructions": [
                    {
                        "index": 0,
                        "instructions": [
                            init_mint_instruction("initializeMint", "MintInner")
                        ]
                    }
                ]
            }
        });
        assert_eq!(extract_initialized_mint(&tx).unwrap(), "MintInner");
    }

    #[test]
    fn test_wrong_program_is_ignored() {
        let tx = tx_with_main_instructions(vec![json!({
            "program": "spl-memo",
            "parsed": {"type": "initializeMint", "info": {"mint": "MintX"}}
        })]);
        assert!(matches!(
            extract_initialized_mint(&tx),
            Err(CoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_no_init_mint_is_not_found() {
        let tx = tx_with_main_instructions(vec![json!({
            "program": "spl-token",
            "parsed": {"type": "transfer", "info": {"amount": "1"}}
        })]);
        assert!(matches!(
            extract_initialized_mint(&tx),
            Err(CoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_raw_unparsed_instruction_is_ignored() {
        // Instructions without a jsonParsed payload must not panic
        let tx = tx_with_main_instructions(vec![json!({
            "programId": "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA",
            "accounts": [1, 2],
            "data": "3Bxs4h24hBtQy9rw"
        })]);
        assert!(extract_initialized_mint(&tx).is_err());
    }
}
