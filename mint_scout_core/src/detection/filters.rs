// WebSocket-level filters for new mint detection
use log::debug;
use serde_json::Value;

/// Filter configuration for log notifications
#[derive(Debug, Clone)]
pub struct LogFilter {
    /// Log substrings that indicate a mint initialization
    pub marker_patterns: Vec<String>,
}

impl LogFilter {
    pub fn new() -> Self {
        // "InitializeMint" also covers InitializeMint2 log lines
        Self {
            marker_patterns: vec!["InitializeMint".to_string()],
        }
    }

    /// Check if a log line contains a mint-initialization marker
    pub fn matches_marker(&self, log: &str) -> bool {
        self.marker_patterns.iter().any(|pattern| log.contains(pattern))
    }
}

impl Default for LogFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Pre-filter WebSocket log notifications before any RPC work happens.
///
/// Returns:
/// - `Ok(Some(signature))` if this event carries the marker and should be
///   considered for processing
/// - `Ok(None)` if this should be filtered out
/// - `Err(msg)` if the notification shape is broken
pub fn should_process_log_notification(
    notification_json: &Value,
    filter: &LogFilter,
) -> Result<Option<String>, String> {
    let method = notification_json
        .get("method")
        .and_then(|m| m.as_str())
        .ok_or("Missing method field")?;

    if method != "logsNotification" {
        return Ok(None);
    }

    let params = notification_json.get("params").ok_or("Missing params")?;

    let result = params.get("result").ok_or("Missing result in params")?;

    let value = result.get("value").ok_or("Missing value in result")?;

    // Skip failed transactions; their mints were never created
    if let Some(err) = value.get("err") {
        if !err.is_null() {
            debug!("Skipping failed transaction with error: {:?}", err);
            return Ok(None);
        }
    }

    let signature = value
        .get("signature")
        .and_then(|s| s.as_str())
        .ok_or("Missing signature")?
        .to_string();

    if let Some(logs) = value.get("logs").and_then(|l| l.as_array()) {
        for log_val in logs {
            if let Some(log) = log_val.as_str() {
                if filter.matches_marker(log) {
                    debug!("Mint-initialization marker in logs for signature: {}", signature);
                    return Ok(Some(signature));
                }
            }
        }
    }

    Ok(None)
}
