use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Symbol assigned to a token before any metadata refinement succeeds.
pub const PLACEHOLDER_SYMBOL: &str = "NEW";

/// Market availability lifecycle of a detected token.
///
/// Serialized in kebab-case so the persisted files and the REST API use the
/// same wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MarketStatus {
    /// Registered, never probed.
    Pending,
    /// Currently part of an in-flight probe batch.
    Checking,
    /// A quote route exists with positive output.
    Available,
    /// Probes ran and found no route.
    NotAvailable,
    /// Last probe failed for infrastructure reasons (rate limit, transport).
    Error,
}

impl MarketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketStatus::Pending => "pending",
            MarketStatus::Checking => "checking",
            MarketStatus::Available => "available",
            MarketStatus::NotAvailable => "not-available",
            MarketStatus::Error => "error",
        }
    }
}

/// A token mint observed via the log subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedToken {
    pub mint: String,
    pub first_seen_at: DateTime<Utc>,
    /// Signature of the transaction that initialized the mint.
    pub origin_signature: String,
    pub name: String,
    pub symbol: String,
    pub market_status: MarketStatus,
    #[serde(default)]
    pub last_checked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub check_attempts: u32,
}

impl DetectedToken {
    /// Create a fresh record with placeholder identity. Name and symbol get
    /// refined later if metadata can be fetched.
    pub fn new(mint: String, origin_signature: String, now: DateTime<Utc>) -> Self {
        let name = placeholder_name(&mint);
        Self {
            mint,
            first_seen_at: now,
            origin_signature,
            name,
            symbol: PLACEHOLDER_SYMBOL.to_string(),
            market_status: MarketStatus::Pending,
            last_checked_at: None,
            check_attempts: 0,
        }
    }

    /// Whether this token still belongs in the market-check queue.
    pub fn needs_market_check(&self, attempt_ceiling: u32) -> bool {
        self.market_status != MarketStatus::Available && self.check_attempts < attempt_ceiling
    }
}

/// Derive the placeholder display name from the mint address prefix.
pub fn placeholder_name(mint: &str) -> String {
    let prefix_len = mint.len().min(8);
    format!("Token-{}", &mint[..prefix_len])
}

/// A token moved out of the detected registry by the snipe transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnipedToken {
    #[serde(flatten)]
    pub token: DetectedToken,
    pub sniped_at: DateTime<Utc>,
    #[serde(default)]
    pub snipe_amount: Option<f64>,
    #[serde(default)]
    pub snipe_price: Option<f64>,
    #[serde(default)]
    pub snipe_signature: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_status_serde_kebab_case() {
        let json = serde_json::to_string(&MarketStatus::NotAvailable).unwrap();
        assert_eq!(json, "\"not-available\"");
        let status: MarketStatus = serde_json::from_str("\"available\"").unwrap();
        assert_eq!(status, MarketStatus::Available);
    }

    #[test]
    fn test_placeholder_identity() {
        let token = DetectedToken::new(
            "So11111111111111111111111111111111111111112".to_string(),
            "sig".to_string(),
            Utc::now(),
        );
        assert_eq!(token.name, "Token-So111111");
        assert_eq!(token.symbol, "NEW");
        assert_eq!(token.market_status, MarketStatus::Pending);
        assert_eq!(token.check_attempts, 0);
    }

    #[test]
    fn test_placeholder_name_short_mint() {
        // Malformed short input must not panic
        assert_eq!(placeholder_name("abc"), "Token-abc");
    }

    #[test]
    fn test_needs_market_check() {
        let mut token = DetectedToken::new("mint111".to_string(), "sig".to_string(), Utc::now());
        assert!(token.needs_market_check(10));

        token.market_status = MarketStatus::Available;
        assert!(!token.needs_market_check(10));

        token.market_status = MarketStatus::Error;
        token.check_attempts = 10;
        assert!(!token.needs_market_check(10));

        token.check_attempts = 9;
        assert!(token.needs_market_check(10));
    }

    #[test]
    fn test_detected_token_deserialize_missing_optional_fields() {
        // Records persisted before the check-tracking fields existed
        let json = r#"{
            "mint": "m1",
            "first_seen_at": "2026-01-01T00:00:00Z",
            "origin_signature": "s1",
            "name": "Token-m1",
            "symbol": "NEW",
            "market_status": "pending"
        }"#;
        let token: DetectedToken = serde_json::from_str(json).unwrap();
        assert_eq!(token.check_attempts, 0);
        assert!(token.last_checked_at.is_none());
    }
}
