use serde_json::Value;
use tracing::Level;

/// Receives one record per request issued and per response received.
///
/// Records never influence control flow; a sink that drops everything is
/// always valid.
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, level: Level, message: &str, data: &Value);
}

/// Drops every record
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl DiagnosticSink for NoopSink {
    fn record(&self, _level: Level, _message: &str, _data: &Value) {}
}

/// Forwards records to `tracing` under the `couchlet` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, level: Level, message: &str, data: &Value) {
        match level {
            Level::ERROR => tracing::error!(target: "couchlet", data = %data, "{}", message),
            Level::WARN => tracing::warn!(target: "couchlet", data = %data, "{}", message),
            Level::INFO => tracing::info!(target: "couchlet", data = %data, "{}", message),
            Level::DEBUG => tracing::debug!(target: "couchlet", data = %data, "{}", message),
            _ => tracing::trace!(target: "couchlet", data = %data, "{}", message),
        }
    }
}
