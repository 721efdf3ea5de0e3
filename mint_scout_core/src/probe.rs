// Liquidity probe against the quote aggregator.
//
// A token is considered available once either swap direction yields a quote
// with positive output. The forward direction (native asset -> mint) retries
// on rate limits; the reverse direction runs once as a fallback.

use crate::quote::{Quote, QuoteClient, QuoteError};
use log::{debug, info, warn};
use solana_program::pubkey::Pubkey;
use std::str::FromStr;

/// Outcome of a market probe, before it is folded into the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeVerdict {
    /// A route with positive output exists.
    Available,
    /// Both directions answered definitively that no route exists.
    NotAvailable,
    /// Rate limiting or transport noise; try again later.
    Error,
}

/// Probe parameters, sourced from Settings.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Mint of the chain's native asset, the fixed probe counterpart.
    pub native_mint: String,
    /// Probe size in the native asset's base units.
    pub quote_amount: u64,
    pub slippage_bps: u16,
    /// Max attempts for the forward direction when rate limited.
    pub max_rate_limit_retries: u32,
    /// Linear retry delay: attempt number times this base.
    pub retry_delay_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            native_mint: spl_token::native_mint::ID.to_string(),
            quote_amount: 1_000_000,
            slippage_bps: 1000,
            max_rate_limit_retries: 3,
            retry_delay_ms: 3000,
        }
    }
}

/// Well-established mints that are never probe targets. Probing these wastes
/// quota and their availability is not in question.
pub const SKIP_MINTS: &[&str] = &[
    // Wrapped SOL
    "So11111111111111111111111111111111111111112",
    // USDC
    "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
    // USDT
    "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB",
];

/// Run the directional liquidity probe for a mint.
///
/// Never returns an error; every failure mode maps onto a verdict so the
/// scheduler has a single reducer input.
pub async fn probe_market<Q: QuoteClient + ?Sized>(
    mint: &str,
    client: &Q,
    config: &ProbeConfig,
) -> ProbeVerdict {
    if Pubkey::from_str(mint).is_err() {
        warn!("Refusing to probe malformed mint address: {}", mint);
        return ProbeVerdict::Error;
    }

    if SKIP_MINTS.contains(&mint) || mint == config.native_mint {
        debug!("Skipping probe for well-known mint {}", mint);
        return ProbeVerdict::NotAvailable;
    }

    let mut saw_rate_limit = false;
    let mut saw_no_route = false;

    // Forward direction: native asset in, token out. Only rate limits are
    // retried; everything else is a definitive answer for this direction.
    let mut attempt = 0u32;
    let forward = loop {
        attempt += 1;
        match client
            .get_quote(&config.native_mint, mint, config.quote_amount, config.slippage_bps)
            .await
        {
            Ok(quote) => break Some(quote),
            Err(QuoteError::RateLimited(msg)) => {
                saw_rate_limit = true;
                if attempt >= config.max_rate_limit_retries {
                    debug!("Forward probe for {} exhausted rate-limit retries", mint);
                    break None;
                }
                let delay_ms = config.retry_delay_ms * attempt as u64;
                debug!(
                    "Rate limited probing {} (attempt {}), backing off {}ms: {}",
                    mint, attempt, delay_ms, msg
                );
                #[cfg(feature = "native")]
                tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
            }
            Err(QuoteError::NoRoute(msg)) => {
                debug!("No forward route for {}: {}", mint, msg);
                saw_no_route = true;
                break None;
            }
            Err(e) => {
                debug!("Forward probe for {} failed: {}", mint, e);
                break None;
            }
        }
    };

    if let Some(quote) = forward {
        if quote.out_amount > 0 {
            info!(
                "Market available for {} ({} base units out, {} hops)",
                mint, quote.out_amount, quote.route_hops
            );
            return ProbeVerdict::Available;
        }
        // An empty quote is a definitive no-liquidity answer
        saw_no_route = true;
    }

    // Reverse direction: token in, native asset out. One attempt only.
    match client
        .get_quote(mint, &config.native_mint, config.quote_amount, config.slippage_bps)
        .await
    {
        Ok(quote) if quote.out_amount > 0 => {
            info!(
                "Market available for {} via reverse route ({} base units out)",
                mint, quote.out_amount
            );
            return ProbeVerdict::Available;
        }
        Ok(_) => saw_no_route = true,
        Err(QuoteError::NoRoute(msg)) => {
            debug!("No reverse route for {}: {}", mint, msg);
            saw_no_route = true;
        }
        Err(QuoteError::RateLimited(_)) => saw_rate_limit = true,
        Err(e) => debug!("Reverse probe for {} failed: {}", mint, e),
    }

    // Rate-limit evidence wins: the answer may exist, we just could not get
    // it. A definite no-route from either direction beats transport noise.
    if saw_rate_limit {
        ProbeVerdict::Error
    } else if saw_no_route {
        ProbeVerdict::NotAvailable
    } else {
        ProbeVerdict::Error
    }
}
