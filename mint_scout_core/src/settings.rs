use crate::detection::ListenerConfig;
use crate::error::CoreError;
use crate::probe::ProbeConfig;
use crate::scheduler::SchedulerConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub solana_ws_urls: Vec<String>,
    pub solana_rpc_urls: Vec<String>,
    #[serde(default = "default_token_program")]
    pub token_program: String,
    #[serde(default = "default_metadata_program")]
    pub metadata_program: String,
    #[serde(default = "default_quote_api_url")]
    pub quote_api_url: String,
    #[serde(default = "default_storage_dir")]
    pub storage_dir: String,

    // Listener
    #[serde(default = "default_event_shed_rate")]
    pub event_shed_rate: f64,
    #[serde(default = "default_tx_fetch_cooldown_ms")]
    pub tx_fetch_cooldown_ms: u64,
    #[serde(default = "default_tx_fetch_retries")]
    pub tx_fetch_retries: u32,
    #[serde(default = "default_metadata_timeout_secs")]
    pub metadata_timeout_secs: u64,
    #[serde(default = "default_seen_cache_capacity")]
    pub seen_cache_capacity: usize,
    #[serde(default = "default_subscribe_retries")]
    pub subscribe_retries: u32,

    // Market-check scheduler
    #[serde(default = "default_queue_tick_secs")]
    pub queue_tick_secs: u64,
    #[serde(default = "default_min_batch_spacing_secs")]
    pub min_batch_spacing_secs: u64,
    #[serde(default = "default_market_check_batch_size")]
    pub market_check_batch_size: usize,
    #[serde(default = "default_probe_stagger_ms")]
    pub probe_stagger_ms: u64,
    #[serde(default = "default_max_check_attempts")]
    pub max_check_attempts: u32,
    #[serde(default = "default_backoff_recovery_secs")]
    pub backoff_recovery_secs: u64,

    // Liquidity prober
    #[serde(default = "default_quote_amount_lamports")]
    pub quote_amount_lamports: u64,
    #[serde(default = "default_quote_slippage_bps")]
    pub quote_slippage_bps: u16,
    #[serde(default = "default_probe_rate_limit_retries")]
    pub probe_rate_limit_retries: u32,
    #[serde(default = "default_probe_retry_delay_ms")]
    pub probe_retry_delay_ms: u64,
    #[serde(default = "default_quote_timeout_secs")]
    pub quote_timeout_secs: u64,

    // Health
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    #[serde(default = "default_reachability_check_secs")]
    pub reachability_check_secs: u64,
    #[serde(default = "default_reachability_failure_threshold")]
    pub reachability_failure_threshold: u32,

    // Control API
    #[serde(default = "default_api_port")]
    pub api_port: u16,
}

impl Settings {
    #[cfg(feature = "native")]
    pub fn from_file(path: &str) -> Result<Self, CoreError> {
        let builder = config::Config::builder().add_source(config::File::with_name(path));
        let cfg = builder.build()?;
        Ok(cfg.try_deserialize()?)
    }

    #[cfg(feature = "native")]
    pub fn save_to_file(&self, path: &str) -> Result<(), CoreError> {
        let toml_string = toml::to_string(self)?;
        std::fs::write(path, toml_string)?;
        Ok(())
    }

    /// Validate settings ranges and constraints
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.solana_ws_urls.is_empty() {
            return Err(CoreError::Validation(
                "solana_ws_urls must not be empty".to_string(),
            ));
        }
        if self.solana_rpc_urls.is_empty() {
            return Err(CoreError::Validation(
                "solana_rpc_urls must not be empty".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.event_shed_rate) {
            return Err(CoreError::Validation(
                "event_shed_rate must be in [0, 1)".to_string(),
            ));
        }
        if !(1..=3).contains(&self.market_check_batch_size) {
            return Err(CoreError::Validation(
                "market_check_batch_size must be between 1 and 3".to_string(),
            ));
        }
        if !(30..=120).contains(&self.queue_tick_secs) {
            return Err(CoreError::Validation(
                "queue_tick_secs must be between 30 and 120".to_string(),
            ));
        }
        if !(5..=30).contains(&self.min_batch_spacing_secs) {
            return Err(CoreError::Validation(
                "min_batch_spacing_secs must be between 5 and 30".to_string(),
            ));
        }
        if self.max_check_attempts == 0 {
            return Err(CoreError::Validation(
                "max_check_attempts must be > 0".to_string(),
            ));
        }
        if self.quote_amount_lamports == 0 {
            return Err(CoreError::Validation(
                "quote_amount_lamports must be > 0".to_string(),
            ));
        }
        if self.seen_cache_capacity == 0 {
            return Err(CoreError::Validation(
                "seen_cache_capacity must be > 0".to_string(),
            ));
        }
        if self.heartbeat_secs == 0 || self.reachability_check_secs == 0 {
            return Err(CoreError::Validation(
                "health intervals must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn listener_config(&self) -> ListenerConfig {
        ListenerConfig {
            shed_rate: self.event_shed_rate,
            fetch_cooldown_ms: self.tx_fetch_cooldown_ms,
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            batch_size: self.market_check_batch_size,
            min_batch_spacing_secs: self.min_batch_spacing_secs,
            attempt_ceiling: self.max_check_attempts,
            probe_stagger_ms: self.probe_stagger_ms,
        }
    }

    pub fn probe_config(&self) -> ProbeConfig {
        ProbeConfig {
            native_mint: spl_token::native_mint::ID.to_string(),
            quote_amount: self.quote_amount_lamports,
            slippage_bps: self.quote_slippage_bps,
            max_rate_limit_retries: self.probe_rate_limit_retries,
            retry_delay_ms: self.probe_retry_delay_ms,
        }
    }
}

fn default_token_program() -> String {
    spl_token::ID.to_string()
}
fn default_metadata_program() -> String {
    "metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s".to_string()
}
fn default_quote_api_url() -> String {
    "https://quote-api.jup.ag/v6/quote".to_string()
}
fn default_storage_dir() -> String {
    "data".to_string()
}
fn default_event_shed_rate() -> f64 {
    0.30
}
fn default_tx_fetch_cooldown_ms() -> u64 {
    2000
}
fn default_tx_fetch_retries() -> u32 {
    3
}
fn default_metadata_timeout_secs() -> u64 {
    5
}
fn default_seen_cache_capacity() -> usize {
    1024
}
fn default_subscribe_retries() -> u32 {
    5
}
fn default_queue_tick_secs() -> u64 {
    45
}
fn default_min_batch_spacing_secs() -> u64 {
    15
}
fn default_market_check_batch_size() -> usize {
    2
}
fn default_probe_stagger_ms() -> u64 {
    500
}
fn default_max_check_attempts() -> u32 {
    10
}
fn default_backoff_recovery_secs() -> u64 {
    60
}
fn default_quote_amount_lamports() -> u64 {
    1_000_000
}
fn default_quote_slippage_bps() -> u16 {
    1000
}
fn default_probe_rate_limit_retries() -> u32 {
    3
}
fn default_probe_retry_delay_ms() -> u64 {
    3000
}
fn default_quote_timeout_secs() -> u64 {
    10
}
fn default_heartbeat_secs() -> u64 {
    30
}
fn default_reachability_check_secs() -> u64 {
    120
}
fn default_reachability_failure_threshold() -> u32 {
    3
}
fn default_api_port() -> u16 {
    3000
}
