//! Unified error handling for the showrunner crate
//!
//! This module provides a unified error type that consolidates all domain-specific
//! errors into a single `Error` enum, while maintaining the ability to use
//! domain-specific errors when needed.
//!
//! # Architecture
//!
//! - [`ShowrunnerErrorTrait`] - Common interface implemented by the unified error
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! # Usage
//!
//! ```rust,ignore
//! use showrunner::error::{Error, ShowrunnerErrorTrait};
//!
//! fn handle_error(err: Error) {
//!     if err.is_recoverable() {
//!         tracing::warn!(code = err.code(), "Retry later: {err}");
//!     } else {
//!         tracing::error!(code = err.code(), "Rejected: {err}");
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

// Re-export domain-specific errors for convenience
pub use crate::camera::error::{CameraError, FallbackError};
pub use crate::config::ConfigError;
pub use crate::scheduler::error::SchedulerError;
pub use crate::scheduler::graphics::GraphicsError;
pub use crate::switcher::error::SwitcherError;

/// Common trait for showrunner error types
pub trait ShowrunnerErrorTrait: std::error::Error {
    /// Check if this error is recoverable (the same call may succeed later)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;

    /// Stable machine-readable code
    fn code(&self) -> &'static str;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Rejected operator action (bad target, boundary, hold not released)
    Operator,
    /// Unknown show, camera or segment
    NotFound,
    /// Configuration and validation errors
    Config,
    /// Switcher, stats or graphics transport errors
    Network,
    /// Storage and I/O errors
    Storage,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Operator => "operator",
            Self::NotFound => "not_found",
            Self::Config => "config",
            Self::Network => "network",
            Self::Storage => "storage",
            Self::Other => "other",
        }
    }
}

/// Unified error type for the showrunner crate
#[derive(Error, Debug)]
pub enum Error {
    /// Segment scheduling errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Camera stats and runtime state errors
    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    /// Camera fallback errors
    #[error("Fallback error: {0}")]
    Fallback(#[from] FallbackError),

    /// Switcher connection and command errors
    #[error("Switcher error: {0}")]
    Switcher(#[from] SwitcherError),

    #[error("Graphics error: {0}")]
    Graphics(#[from] GraphicsError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// No show with this id is loaded
    #[error("Show not found: {0}")]
    ShowNotFound(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ShowrunnerErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Scheduler(e) => e.is_recoverable(),
            Self::Camera(e) => e.is_recoverable(),
            Self::Fallback(e) => e.is_recoverable(),
            Self::Switcher(e) => e.is_recoverable(),
            Self::Graphics(_) => true,
            Self::Config(_) => false,
            Self::ShowNotFound(_) => false,
            Self::Io(_) => true,
            Self::Json(_) => false,
            Self::Other { .. } => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Scheduler(e) => match e {
                SchedulerError::SegmentNotFound { .. } => ErrorCategory::NotFound,
                SchedulerError::InvalidConfig { .. } | SchedulerError::NoSegments => {
                    ErrorCategory::Config
                }
                _ => ErrorCategory::Operator,
            },
            Self::Camera(e) => match e {
                CameraError::UnknownCamera { .. } => ErrorCategory::NotFound,
                _ => ErrorCategory::Network,
            },
            Self::Fallback(e) => match e {
                FallbackError::UnknownCamera { .. } => ErrorCategory::NotFound,
                _ => ErrorCategory::Operator,
            },
            Self::Switcher(_) | Self::Graphics(_) => ErrorCategory::Network,
            Self::Config(_) => ErrorCategory::Config,
            Self::ShowNotFound(_) => ErrorCategory::NotFound,
            Self::Io(_) => ErrorCategory::Storage,
            Self::Json(_) => ErrorCategory::Config,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Scheduler(e) => e.code(),
            Self::Camera(CameraError::UnknownCamera { .. }) => "unknown_camera",
            Self::Camera(_) => "camera_stats",
            Self::Fallback(FallbackError::CooldownActive { .. }) => "fallback_cooldown",
            Self::Fallback(FallbackError::UnknownCamera { .. }) => "unknown_camera",
            Self::Fallback(FallbackError::SelfFallback { .. }) => "self_fallback",
            Self::Switcher(SwitcherError::NotConnected { .. }) => "switcher_not_connected",
            Self::Switcher(_) => "switcher",
            Self::Graphics(_) => "graphics",
            Self::Config(_) => "invalid_config",
            Self::ShowNotFound(_) => "show_not_found",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Other { .. } => "internal",
        }
    }
}

impl Error {
    pub fn show_not_found(show_id: impl Into<String>) -> Self {
        Self::ShowNotFound(show_id.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

// Conversion from anyhow::Error
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            context: format!("{err:#}"),
            source: None,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category() {
        let err: Error = SchedulerError::segment_not_found("x").into();
        assert_eq!(err.category(), ErrorCategory::NotFound);

        let err: Error = SchedulerError::at_last("x").into();
        assert_eq!(err.category(), ErrorCategory::Operator);

        let err: Error = SwitcherError::not_connected("show").into();
        assert_eq!(err.category(), ErrorCategory::Network);
        assert_eq!(err.code(), "switcher_not_connected");
    }

    #[test]
    fn test_is_recoverable() {
        let hold: Error = SchedulerError::HoldMinimumNotMet {
            segment_id: "h".into(),
            elapsed_ms: 0,
            min_duration_ms: 1000,
        }
        .into();
        assert!(hold.is_recoverable());

        let cooldown: Error = FallbackError::CooldownActive {
            camera_id: "cam1".into(),
            remaining_ms: 2000,
        }
        .into();
        assert!(cooldown.is_recoverable());
        assert_eq!(cooldown.code(), "fallback_cooldown");

        assert!(!Error::show_not_found("nope").is_recoverable());
    }

    #[test]
    fn test_error_conversion() {
        let unified: Error = ConfigError::invalid("segments", "empty").into();
        assert!(matches!(unified, Error::Config(_)));
        assert_eq!(unified.category(), ErrorCategory::Config);
    }

    #[test]
    fn test_other_error() {
        let err = Error::other("Something went wrong");
        assert_eq!(err.category(), ErrorCategory::Other);
        assert_eq!(err.to_string(), "Something went wrong");
    }
}
