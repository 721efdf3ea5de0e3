// In-memory token registry with reducer-style mutations.
// Persistence is the caller's concern; every mutation is synchronous so the
// transition rules stay unit-testable without a runtime.

use crate::error::CoreError;
use crate::models::{DetectedToken, MarketStatus, SnipedToken};
use chrono::{DateTime, Utc};
use log::debug;

/// Optional fill details attached to a snipe transition.
#[derive(Debug, Clone, Default)]
pub struct SnipeFill {
    pub amount: Option<f64>,
    pub price: Option<f64>,
    pub signature: Option<String>,
}

/// Detected and sniped token registries, both newest-first.
#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    detected: Vec<DetectedToken>,
    sniped: Vec<SnipedToken>,
}

impl TokenStore {
    pub fn from_parts(detected: Vec<DetectedToken>, sniped: Vec<SnipedToken>) -> Self {
        Self { detected, sniped }
    }

    pub fn detected(&self) -> &[DetectedToken] {
        &self.detected
    }

    pub fn sniped(&self) -> &[SnipedToken] {
        &self.sniped
    }

    pub fn get(&self, mint: &str) -> Option<&DetectedToken> {
        self.detected.iter().find(|t| t.mint == mint)
    }

    pub fn is_sniped(&self, mint: &str) -> bool {
        self.sniped.iter().any(|s| s.token.mint == mint)
    }

    /// Insert a newly detected token at the front of the registry.
    /// Returns false when the mint is already known (detected or sniped).
    pub fn insert_detected(&mut self, token: DetectedToken) -> bool {
        if self.get(&token.mint).is_some() || self.is_sniped(&token.mint) {
            debug!("Duplicate mint ignored: {}", token.mint);
            return false;
        }
        self.detected.insert(0, token);
        true
    }

    /// Set the market status of a detected token without touching the
    /// attempt counter. Used to mark batch members as checking.
    pub fn set_status(&mut self, mint: &str, status: MarketStatus) -> bool {
        match self.detected.iter_mut().find(|t| t.mint == mint) {
            Some(token) => {
                token.market_status = status;
                true
            }
            None => false,
        }
    }

    /// Apply a finished probe to a token: set the resolved status, stamp the
    /// check time and bump the attempt counter. Returns the new attempt
    /// count, or None when the token is no longer in the registry.
    pub fn apply_probe_verdict(
        &mut self,
        mint: &str,
        status: MarketStatus,
        now: DateTime<Utc>,
    ) -> Option<u32> {
        let token = self.detected.iter_mut().find(|t| t.mint == mint)?;
        token.market_status = status;
        token.last_checked_at = Some(now);
        token.check_attempts += 1;
        Some(token.check_attempts)
    }

    /// Replace the placeholder identity with fetched metadata. Empty strings
    /// are ignored so a partial fetch never blanks out a field.
    pub fn refine_identity(&mut self, mint: &str, name: Option<&str>, symbol: Option<&str>) -> bool {
        let Some(token) = self.detected.iter_mut().find(|t| t.mint == mint) else {
            return false;
        };
        if let Some(n) = name.filter(|n| !n.is_empty()) {
            token.name = n.to_string();
        }
        if let Some(s) = symbol.filter(|s| !s.is_empty()) {
            token.symbol = s.to_string();
        }
        true
    }

    pub fn remove_detected(&mut self, mint: &str) -> bool {
        let before = self.detected.len();
        self.detected.retain(|t| t.mint != mint);
        self.detected.len() != before
    }

    pub fn remove_sniped(&mut self, mint: &str) -> bool {
        let before = self.sniped.len();
        self.sniped.retain(|s| s.token.mint != mint);
        self.sniped.len() != before
    }

    pub fn clear_detected(&mut self) {
        self.detected.clear();
    }

    /// Move a token from the detected registry to the sniped registry.
    /// The removal and the append happen in one mutation, so the mint is
    /// never present in both or in neither.
    pub fn snipe(
        &mut self,
        mint: &str,
        fill: SnipeFill,
        now: DateTime<Utc>,
    ) -> Result<SnipedToken, CoreError> {
        if self.is_sniped(mint) {
            return Err(CoreError::InvalidInput(format!(
                "Token already sniped: {}",
                mint
            )));
        }
        let pos = self
            .detected
            .iter()
            .position(|t| t.mint == mint)
            .ok_or_else(|| CoreError::NotFound(format!("Token not detected: {}", mint)))?;
        let token = self.detected.remove(pos);
        let sniped = SnipedToken {
            token,
            sniped_at: now,
            snipe_amount: fill.amount,
            snipe_price: fill.price,
            snipe_signature: fill.signature,
        };
        self.sniped.insert(0, sniped.clone());
        Ok(sniped)
    }
}
