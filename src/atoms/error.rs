// ── wabot Atoms: Error Types ───────────────────────────────────────────────
// Single canonical error enum for the bot engine, built with `thiserror`.
//
// Rules:
//   • Variants are coarse-grained by domain (I/O, lookup, channel, config…).
//   • `#[from]` wires std/external error conversions automatically.
//   • No variant carries the Evolution API key in its message.

use thiserror::Error;

// ── Primary error enum ─────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum EngineError {
    /// Filesystem or socket failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP / network failure (reqwest layer).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The command repository could not answer a query.
    #[error("Lookup error: {0}")]
    Lookup(String),

    /// A bounded operation did not finish in time.
    #[error("Timed out after {millis} ms: {operation}")]
    Timeout { operation: String, millis: u64 },

    /// Channel / transport failure (send rejected, listener bind, …).
    #[error("Channel error: {channel}: {message}")]
    Channel { channel: String, message: String },

    /// Configuration is invalid or unreadable.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A command definition failed validation.
    #[error("Invalid command: {0}")]
    Validation(String),

    /// The normalized command text is already taken.
    #[error("Command already exists: {0}")]
    Duplicate(String),

    /// No command with the given id.
    #[error("Command not found: {0}")]
    NotFound(u64),

    #[error("{0}")]
    Other(String),
}

// ── Convenience constructors ───────────────────────────────────────────────

impl EngineError {
    /// Create a channel error with name and message.
    pub fn channel(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Channel { channel: channel.into(), message: message.into() }
    }

    /// Create a timeout error for a named operation.
    pub fn timeout(operation: impl Into<String>, limit: std::time::Duration) -> Self {
        Self::Timeout { operation: operation.into(), millis: limit.as_millis() as u64 }
    }
}

impl From<String> for EngineError {
    fn from(s: String) -> Self {
        EngineError::Other(s)
    }
}

impl From<&str> for EngineError {
    fn from(s: &str) -> Self {
        EngineError::Other(s.to_string())
    }
}

// ── Convenience alias ──────────────────────────────────────────────────────

/// All engine operations return this type.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn channel_error_display() {
        let e = EngineError::channel("whatsapp", "sendText 401");
        assert_eq!(e.to_string(), "Channel error: whatsapp: sendText 401");
    }

    #[test]
    fn timeout_error_reports_millis() {
        let e = EngineError::timeout("find_prefixed", Duration::from_secs(3));
        assert_eq!(e.to_string(), "Timed out after 3000 ms: find_prefixed");
    }

    #[test]
    fn string_converts_to_other() {
        let e: EngineError = "boom".into();
        assert!(matches!(e, EngineError::Other(ref m) if m == "boom"));
    }
}
