//! Scheduler state snapshots and audit trails

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::models::Segment;

/// Lifecycle of a show's run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    Stopped,
    Running,
    Paused,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Paused => "paused",
        };
        f.write_str(s)
    }
}

/// Why a segment left the air
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryReason {
    AutoAdvance,
    ManualAdvance,
    ManualPrevious,
    Jump,
    /// The show was stopped by an operator
    Completed,
    /// The last segment ran out on its own
    NaturalCompletion,
}

/// One segment that has been on air
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub segment_id: String,
    pub segment_name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Time actually on air, excluding pauses
    pub actual_duration_ms: u64,
    pub planned_duration_ms: Option<u64>,
    pub reason: HistoryReason,
    pub actor: Option<String>,
}

/// Kind of manual intervention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideKind {
    Advance,
    Previous,
    Jump,
    Pause,
    Resume,
    Stop,
}

/// Audit record of an operator action
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverrideEntry {
    pub id: Uuid,
    pub kind: OverrideKind,
    pub actor: String,
    pub from_segment_id: Option<String>,
    pub to_segment_id: Option<String>,
    /// Elapsed time on the outgoing segment when the action was taken
    pub elapsed_ms: u64,
    pub at: DateTime<Utc>,
}

impl OverrideEntry {
    pub fn new(
        kind: OverrideKind,
        actor: &str,
        from_segment_id: Option<String>,
        to_segment_id: Option<String>,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            actor: actor.to_string(),
            from_segment_id,
            to_segment_id,
            elapsed_ms,
            at: Utc::now(),
        }
    }
}

/// Point-in-time view of the scheduler
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub show_id: String,
    pub lifecycle: Lifecycle,
    pub rehearsal: bool,

    /// -1 when stopped
    pub current_segment_index: i64,
    pub current_segment: Option<Segment>,
    pub next_segment: Option<Segment>,
    pub previous_segment: Option<Segment>,

    /// The on-air segment was removed by a config update
    pub current_segment_deleted: bool,

    pub elapsed_ms: u64,
    pub remaining_ms: Option<u64>,
    /// 0.0..=1.0; zero for open-ended segments
    pub progress: f64,

    /// Current segment is a hold whose minimum has not elapsed yet
    pub hold_locked: bool,
    pub hold_remaining_ms: Option<u64>,

    pub segment_count: usize,
    pub history_count: usize,
    pub override_count: usize,

    pub show_started_at: Option<DateTime<Utc>>,
    pub segment_started_at: Option<DateTime<Utc>>,
}

/// Remaining time and progress for a segment at `elapsed_ms`
pub(crate) fn timing(segment: &Segment, elapsed_ms: u64) -> (Option<u64>, f64) {
    match segment.duration_ms() {
        Some(duration) => {
            let remaining = duration.saturating_sub(elapsed_ms);
            let progress = (elapsed_ms as f64 / duration as f64).clamp(0.0, 1.0);
            (Some(remaining), progress)
        }
        None => (None, 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SegmentType;

    #[test]
    fn test_timing() {
        let seg = Segment::new("a", "A", SegmentType::Live).with_duration(10);
        assert_eq!(timing(&seg, 2500), (Some(7500), 0.25));
        assert_eq!(timing(&seg, 12_000), (Some(0), 1.0));

        let open = Segment::new("b", "B", SegmentType::Hold);
        assert_eq!(timing(&open, 5000), (None, 0.0));
    }

    #[test]
    fn test_override_entries_get_unique_ids() {
        let a = OverrideEntry::new(OverrideKind::Pause, "td", None, None, 0);
        let b = OverrideEntry::new(OverrideKind::Pause, "td", None, None, 0);
        assert_ne!(a.id, b.id);
    }
}
