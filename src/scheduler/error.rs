//! Error types for the scheduler module

use std::fmt;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
///
/// All of these are configuration or operator errors: they are returned to
/// the caller and leave the engine state untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// The show has no segments to run
    NoSegments,

    /// Advance requested on the final segment
    AtLastSegment { segment_id: String },

    /// Previous requested on the first segment
    AtFirstSegment { segment_id: String },

    /// A hold segment was left before its minimum duration
    HoldMinimumNotMet {
        segment_id: String,
        elapsed_ms: u64,
        min_duration_ms: u64,
    },

    /// Jump target does not exist
    SegmentNotFound { segment_id: String },

    /// Replacement configuration can't be applied
    InvalidConfig { reason: String },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSegments => write!(f, "Show has no segments"),
            Self::AtLastSegment { segment_id } => {
                write!(f, "Already at last segment '{}'", segment_id)
            }
            Self::AtFirstSegment { segment_id } => {
                write!(f, "Already at first segment '{}'", segment_id)
            }
            Self::HoldMinimumNotMet {
                segment_id,
                elapsed_ms,
                min_duration_ms,
            } => {
                write!(
                    f,
                    "Hold '{}' must run {}ms before advancing ({}ms elapsed)",
                    segment_id, min_duration_ms, elapsed_ms
                )
            }
            Self::SegmentNotFound { segment_id } => {
                write!(f, "Segment not found: {}", segment_id)
            }
            Self::InvalidConfig { reason } => {
                write!(f, "Invalid show configuration: {}", reason)
            }
        }
    }
}

impl std::error::Error for SchedulerError {}

impl SchedulerError {
    /// Create an at-last-segment error
    pub fn at_last(segment_id: impl Into<String>) -> Self {
        Self::AtLastSegment {
            segment_id: segment_id.into(),
        }
    }

    /// Create an at-first-segment error
    pub fn at_first(segment_id: impl Into<String>) -> Self {
        Self::AtFirstSegment {
            segment_id: segment_id.into(),
        }
    }

    /// Create a segment not found error
    pub fn segment_not_found(segment_id: impl Into<String>) -> Self {
        Self::SegmentNotFound {
            segment_id: segment_id.into(),
        }
    }

    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Whether the same call may succeed later without a config change
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::HoldMinimumNotMet { .. })
    }

    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoSegments => "no_segments",
            Self::AtLastSegment { .. } => "at_last_segment",
            Self::AtFirstSegment { .. } => "at_first_segment",
            Self::HoldMinimumNotMet { .. } => "hold_minimum_not_met",
            Self::SegmentNotFound { .. } => "segment_not_found",
            Self::InvalidConfig { .. } => "invalid_config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SchedulerError::segment_not_found("seg-9");
        assert_eq!(err.to_string(), "Segment not found: seg-9");

        let err = SchedulerError::HoldMinimumNotMet {
            segment_id: "hold".into(),
            elapsed_ms: 1500,
            min_duration_ms: 10_000,
        };
        assert!(err.to_string().contains("10000ms"));
        assert!(err.to_string().contains("1500ms"));
    }

    #[test]
    fn test_is_recoverable() {
        assert!(!SchedulerError::NoSegments.is_recoverable());
        assert!(SchedulerError::HoldMinimumNotMet {
            segment_id: "hold".into(),
            elapsed_ms: 0,
            min_duration_ms: 1000,
        }
        .is_recoverable());
        assert_eq!(SchedulerError::at_last("x").code(), "at_last_segment");
    }
}
