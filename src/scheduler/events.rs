//! Notifications published by the segment scheduler

use super::state::{HistoryReason, OverrideEntry};
use crate::models::{Segment, TransitionSpec};

/// Scheduler event
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleEvent {
    ShowStarted {
        show_id: String,
        segment_count: usize,
    },

    ShowStopped {
        show_id: String,
        completed_naturally: bool,
    },

    /// The last segment ran out; sent once, before `ShowStopped`
    ShowComplete {
        show_id: String,
    },

    SegmentActivated {
        index: usize,
        segment: Segment,
        previous_segment_id: Option<String>,
        transition: TransitionSpec,
    },

    SegmentCompleted {
        segment_id: String,
        reason: HistoryReason,
        actual_duration_ms: u64,
    },

    /// Once per scheduler tick while running
    Tick {
        segment_id: String,
        elapsed_ms: u64,
        remaining_ms: Option<u64>,
        progress: f64,
    },

    HoldStarted {
        segment_id: String,
        min_duration_ms: u64,
        max_duration_ms: Option<u64>,
    },

    HoldMaxReached {
        segment_id: String,
        elapsed_ms: u64,
        max_duration_ms: u64,
    },

    OverrideRecorded(OverrideEntry),

    /// A config update removed the on-air segment
    CurrentSegmentDeleted {
        segment_id: String,
        resume_index: usize,
    },

    Paused {
        segment_id: Option<String>,
        elapsed_ms: u64,
    },

    Resumed {
        segment_id: Option<String>,
        elapsed_ms: u64,
    },

    GraphicTriggered {
        segment_id: String,
        graphic_ref: Option<String>,
    },

    MediaTriggered {
        segment_id: String,
        input_name: String,
        file: Option<String>,
    },

    AudioCueTriggered {
        segment_id: String,
        cue_ref: String,
        input_name: String,
    },

    /// An outbound call failed; the scheduler keeps running
    CommandFailed {
        operation: String,
        segment_id: String,
        message: String,
    },

    ConfigUpdated {
        segment_count: usize,
        current_segment_id: Option<String>,
    },

    RehearsalChanged {
        enabled: bool,
    },
}

impl ScheduleEvent {
    /// Short name for logs and the event stream
    pub fn name(&self) -> &'static str {
        match self {
            Self::ShowStarted { .. } => "show_started",
            Self::ShowStopped { .. } => "show_stopped",
            Self::ShowComplete { .. } => "show_complete",
            Self::SegmentActivated { .. } => "segment_activated",
            Self::SegmentCompleted { .. } => "segment_completed",
            Self::Tick { .. } => "tick",
            Self::HoldStarted { .. } => "hold_started",
            Self::HoldMaxReached { .. } => "hold_max_reached",
            Self::OverrideRecorded(_) => "override_recorded",
            Self::CurrentSegmentDeleted { .. } => "current_segment_deleted",
            Self::Paused { .. } => "paused",
            Self::Resumed { .. } => "resumed",
            Self::GraphicTriggered { .. } => "graphic_triggered",
            Self::MediaTriggered { .. } => "media_triggered",
            Self::AudioCueTriggered { .. } => "audio_cue_triggered",
            Self::CommandFailed { .. } => "command_failed",
            Self::ConfigUpdated { .. } => "config_updated",
            Self::RehearsalChanged { .. } => "rehearsal_changed",
        }
    }
}
