//! Error types for the switcher module

use thiserror::Error;

/// Result type for switcher operations
pub type SwitcherResult<T> = Result<T, SwitcherError>;

/// Errors raised while connecting to or commanding the production switcher
#[derive(Error, Debug)]
pub enum SwitcherError {
    /// Opening a connection failed
    #[error("Failed to connect to switcher at {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    /// No live connection exists for the show
    #[error("No switcher connection for show '{show_id}'")]
    NotConnected { show_id: String },

    /// The switcher rejected or failed a command
    #[error("Switcher command '{command}' failed: {reason}")]
    CommandFailed { command: String, reason: String },

    /// The connection was closed underneath the caller
    #[error("Switcher connection closed: {0}")]
    Closed(String),

    /// Address could not be turned into an endpoint
    #[error("Invalid switcher address: {0}")]
    InvalidAddress(String),

    /// Transport-level HTTP failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl SwitcherError {
    pub fn connection_failed(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            address: address.into(),
            reason: reason.into(),
        }
    }

    pub fn not_connected(show_id: impl Into<String>) -> Self {
        Self::NotConnected {
            show_id: show_id.into(),
        }
    }

    pub fn command_failed(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            reason: reason.into(),
        }
    }

    /// Whether retrying later can succeed
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InvalidAddress(_))
    }
}
