// Quote API abstraction for liquidity probing

use async_trait::async_trait;
use thiserror::Error;

/// A single swap quote returned by the aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    /// Output amount in the output mint's base units.
    pub out_amount: u64,
    /// Number of route legs the aggregator found.
    pub route_hops: usize,
}

/// Classified quote failure. The prober's retry and verdict logic depends on
/// this classification, so native transport errors must be mapped into it at
/// the client boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuoteError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("no route: {0}")]
    NoRoute(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Abstract quote client trait
#[async_trait]
pub trait QuoteClient: Send + Sync {
    /// Request a quote for swapping `amount` of `input_mint` into
    /// `output_mint` with the given slippage tolerance.
    async fn get_quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount: u64,
        slippage_bps: u16,
    ) -> Result<Quote, QuoteError>;
}

/// Map an HTTP status and response body onto a QuoteError.
///
/// 429 and rate-limit-shaped bodies are retryable; 400/404 and
/// no-route-shaped bodies mean the pair is not tradable yet; anything else
/// is transport noise.
pub fn classify_quote_failure(status: Option<u16>, body: &str) -> QuoteError {
    let lower = body.to_lowercase();

    if status == Some(429)
        || lower.contains("rate limit")
        || lower.contains("too many requests")
    {
        return QuoteError::RateLimited(truncate_body(body));
    }

    if matches!(status, Some(400) | Some(404))
        || lower.contains("could_not_find_any_route")
        || lower.contains("no route")
        || lower.contains("not tradable")
        || lower.contains("token_not_tradable")
    {
        return QuoteError::NoRoute(truncate_body(body));
    }

    QuoteError::Transport(match status {
        Some(code) => format!("HTTP {}: {}", code, truncate_body(body)),
        None => truncate_body(body),
    })
}

// Error bodies can be large HTML pages; keep logs and stored messages short.
fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_rate_limit_by_status() {
        let err = classify_quote_failure(Some(429), "slow down");
        assert!(matches!(err, QuoteError::RateLimited(_)));
    }

    #[test]
    fn test_classify_rate_limit_by_body() {
        let err = classify_quote_failure(Some(503), "Too Many Requests from this IP");
        assert!(matches!(err, QuoteError::RateLimited(_)));
    }

    #[test]
    fn test_classify_no_route_by_status() {
        assert!(matches!(
            classify_quote_failure(Some(400), "bad request"),
            QuoteError::NoRoute(_)
        ));
        assert!(matches!(
            classify_quote_failure(Some(404), "not found"),
            QuoteError::NoRoute(_)
        ));
    }

    #[test]
    fn test_classify_no_route_by_body() {
        let err = classify_quote_failure(
            Some(500),
            r#"{"error":"COULD_NOT_FIND_ANY_ROUTE","message":"..."}"#,
        );
        assert!(matches!(err, QuoteError::NoRoute(_)));
    }

    #[test]
    fn test_classify_server_error_is_transport() {
        let err = classify_quote_failure(Some(500), "internal server error");
        assert!(matches!(err, QuoteError::Transport(_)));
    }

    #[test]
    fn test_body_truncation() {
        let long = "x".repeat(5000);
        let err = classify_quote_failure(Some(500), &long);
        if let QuoteError::Transport(msg) = err {
            assert!(msg.len() < 300);
        } else {
            panic!("expected transport error");
        }
    }
}
