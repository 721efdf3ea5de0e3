// Native quote client against a Jupiter-style quote endpoint

use crate::error::CoreError;
use crate::quote::{classify_quote_failure, Quote, QuoteClient, QuoteError};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Quote client speaking the Jupiter v6 GET /quote wire format.
pub struct JupiterQuoteClient {
    client: Client,
    base_url: String,
}

impl JupiterQuoteClient {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, CoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Init(format!("Failed to build quote client: {}", e)))?;
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl QuoteClient for JupiterQuoteClient {
    async fn get_quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount: u64,
        slippage_bps: u16,
    ) -> Result<Quote, QuoteError> {
        let url = Url::parse_with_params(
            &self.base_url,
            &[
                ("inputMint", input_mint),
                ("outputMint", output_mint),
                ("amount", &amount.to_string()),
                ("slippageBps", &slippage_bps.to_string()),
            ],
        )
        .map_err(|e| QuoteError::Malformed(format!("Bad quote URL: {}", e)))?;

        debug!("Requesting quote: {} -> {}", input_mint, output_mint);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| QuoteError::Transport(format!("Quote request failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| QuoteError::Transport(format!("Failed to read quote body: {}", e)))?;

        if !(200..300).contains(&status) {
            return Err(classify_quote_failure(Some(status), &body));
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| QuoteError::Malformed(format!("Quote body is not JSON: {}", e)))?;

        // Some deployments answer 200 with an error payload
        if let Some(err) = value.get("error") {
            let msg = err.as_str().map(|s| s.to_string()).unwrap_or_else(|| err.to_string());
            return Err(classify_quote_failure(None, &msg));
        }

        // outAmount comes back as a decimal string; older deployments use a number
        let out_amount = value
            .get("outAmount")
            .and_then(|v| {
                v.as_str()
                    .and_then(|s| s.parse::<u64>().ok())
                    .or_else(|| v.as_u64())
            })
            .ok_or_else(|| QuoteError::Malformed("Missing outAmount in quote".to_string()))?;

        let route_hops = value
            .get("routePlan")
            .and_then(|r| r.as_array())
            .map(|a| a.len())
            .unwrap_or(0);

        Ok(Quote {
            out_amount,
            route_hops,
        })
    }
}
