// Mint Scout Core Library
// Platform-agnostic mint detection and market-check logic

pub mod detection;
pub mod error;
pub mod health;
pub mod metadata;
pub mod models;
pub mod probe;
pub mod quote;
pub mod rpc_client;
pub mod scheduler;
pub mod settings;
pub mod storage_trait;
pub mod store;
pub mod transaction_service;
pub mod tx_parser;

#[cfg(feature = "native")]
pub mod native;

// Re-exports
pub use detection::{EventDisposition, ListenerConfig, ListenerMetrics, MintListener};
pub use error::CoreError;
pub use health::ConnectionHealth;
pub use metadata::*;
pub use models::*;
pub use probe::{probe_market, ProbeConfig, ProbeVerdict};
pub use quote::{Quote, QuoteClient, QuoteError};
pub use rpc_client::*;
pub use scheduler::{
    apply_manual_outcome, apply_probe_outcome, MarketCheckState, SchedulerConfig,
};
pub use settings::Settings;
pub use storage_trait::*;
pub use store::{SnipeFill, TokenStore};
pub use transaction_service::*;
pub use tx_parser::*;
