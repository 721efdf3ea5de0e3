// Mint detection: notification filtering, event dispositions, metrics

pub mod filters;
pub mod listener;
pub mod metrics;

pub use filters::{should_process_log_notification, LogFilter};
pub use listener::{EventDisposition, ListenerConfig, MintListener};
pub use metrics::{ListenerMetrics, MetricsSnapshot};
