// Error handling framework

use thiserror::Error;

/// Redis connection parameter errors
///
/// Raised while resolving connection parameters, before any network call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing REDIS_HOST (set it in the secret store or as an environment variable)")]
    MissingHost,

    #[error("Invalid REDIS_PORT '{value}': {reason}")]
    InvalidPort { value: String, reason: String },

    #[error("Secret store unreadable: {0}")]
    SecretStore(String),
}

/// Errors raised while building the client or probing the server
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("Failed to create Redis client: {0}")]
    ClientSetup(String),

    #[error("Failed to connect: {0}")]
    ConnectFailed(String),

    #[error("Liveness probe failed: {0}")]
    ProbeFailed(String),

    #[error("Unexpected PING response: {0}")]
    UnexpectedProbeResponse(String),
}

/// Key-value store errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("{command} failed: {reason}")]
    Command { command: &'static str, reason: String },
}

impl StoreError {
    /// Config and connection failures halt the page; command failures do not.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Config(_) | StoreError::Connection(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_host_message_names_variable() {
        let err = StoreError::from(ConfigError::MissingHost);
        assert!(err.to_string().contains("REDIS_HOST"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_command_error_is_not_fatal() {
        let err = StoreError::Command {
            command: "SET",
            reason: "READONLY".to_string(),
        };
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "SET failed: READONLY");
    }

    #[test]
    fn test_invalid_port_message() {
        let err = ConfigError::InvalidPort {
            value: "abc".to_string(),
            reason: "invalid digit found in string".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid REDIS_PORT 'abc': invalid digit found in string"
        );
    }
}
