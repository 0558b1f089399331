//! Error types for the camera module

use thiserror::Error;

/// Result type for camera operations
pub type CameraResult<T> = Result<T, CameraError>;

/// Errors raised by the camera health and runtime components
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Unknown camera '{camera_id}'")]
    UnknownCamera { camera_id: String },

    /// The stats source could not be read
    #[error("Stats fetch from {source_url} failed: {reason}")]
    StatsFetch { source_url: String, reason: String },

    /// The stats source answered with something we can't interpret
    #[error("Malformed stats payload: {0}")]
    MalformedStats(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl CameraError {
    pub fn unknown_camera(camera_id: impl Into<String>) -> Self {
        Self::UnknownCamera {
            camera_id: camera_id.into(),
        }
    }

    pub fn stats_fetch(source_url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StatsFetch {
            source_url: source_url.into(),
            reason: reason.into(),
        }
    }

    /// Whether the next poll can succeed without operator action
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::UnknownCamera { .. })
    }
}

/// Result type for fallback operations
pub type FallbackResult<T> = Result<T, FallbackError>;

/// Reasons a fallback request is refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FallbackError {
    /// A fallback for this camera was switched too recently
    #[error("Fallback cooldown active for camera '{camera_id}' ({remaining_ms}ms remaining)")]
    CooldownActive { camera_id: String, remaining_ms: u64 },

    #[error("Unknown camera '{camera_id}'")]
    UnknownCamera { camera_id: String },

    /// A camera can't stand in for itself
    #[error("Camera '{camera_id}' cannot be its own fallback")]
    SelfFallback { camera_id: String },
}

impl FallbackError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::CooldownActive { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CameraError::unknown_camera("cam9");
        assert_eq!(err.to_string(), "Unknown camera 'cam9'");
        assert!(!err.is_recoverable());

        let err = FallbackError::CooldownActive {
            camera_id: "cam1".into(),
            remaining_ms: 4200,
        };
        assert!(err.to_string().contains("4200ms"));
        assert!(err.is_recoverable());
    }
}
