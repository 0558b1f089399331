//! Core data structures shared across the show runtime
//!
//! Segments and camera configs are supplied by configuration and treated as
//! immutable values: a reconfiguration replaces them wholesale.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// ============================================================================
// Segments
// ============================================================================

/// Kind of show segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SegmentType {
    /// Fixed shot with no camera changes
    #[default]
    Static,
    /// Single live camera
    Live,
    /// Multi-camera layout
    Multi,
    /// Waits for an explicit producer decision
    Hold,
    /// Commercial or intermission break
    Break,
    /// Pre-recorded media playback
    Video,
    /// Full-screen graphic
    Graphic,
}

impl SegmentType {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Live => "live",
            Self::Multi => "multi",
            Self::Hold => "hold",
            Self::Break => "break",
            Self::Video => "video",
            Self::Graphic => "graphic",
        }
    }

    /// Whether activating this segment fires its graphic
    pub fn triggers_graphic(&self) -> bool {
        matches!(self, Self::Live | Self::Multi | Self::Break | Self::Graphic)
    }
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transition type and duration to apply before a scene change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionSpec {
    /// Switcher transition name (e.g. "Fade", "Cut", "Stinger")
    pub kind: String,

    /// Transition duration in milliseconds
    #[serde(default)]
    pub duration_ms: u32,
}

impl TransitionSpec {
    /// Create a transition spec
    pub fn new(kind: impl Into<String>, duration_ms: u32) -> Self {
        Self {
            kind: kind.into(),
            duration_ms,
        }
    }

    /// A hard cut with zero duration
    pub fn cut() -> Self {
        Self::new("Cut", 0)
    }
}

/// Media input to (re)start when a video segment activates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaTarget {
    /// Switcher input that plays the media
    pub input_name: String,

    /// File to point the input at before restarting it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Per-segment audio adjustment for one switcher input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioOverride {
    pub input_name: String,

    /// Linear volume 0.0..=1.0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
}

fn default_true() -> bool {
    true
}

/// One timed unit of a show's run-of-show
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Unique identifier within the show
    pub id: String,

    /// Display name
    pub name: String,

    /// Segment kind
    #[serde(rename = "type", default)]
    pub segment_type: SegmentType,

    /// Planned duration; `None` means open-ended
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u64>,

    /// Advance automatically once the duration elapses
    #[serde(default = "default_true")]
    pub auto_advance: bool,

    /// Scene to put on air when this segment activates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub switcher_scene: Option<String>,

    /// Transition override for entering this segment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<TransitionSpec>,

    /// Minimum time on a hold segment before it may be left
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_duration_seconds: Option<u64>,

    /// Time after which a hold segment raises an overrun notification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration_seconds: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graphic_ref: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_cue_ref: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaTarget>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audio_overrides: Vec<AudioOverride>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Segment {
    /// Create a segment with defaults for every optional field
    pub fn new(id: impl Into<String>, name: impl Into<String>, segment_type: SegmentType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            segment_type,
            duration_seconds: None,
            auto_advance: true,
            switcher_scene: None,
            transition: None,
            min_duration_seconds: None,
            max_duration_seconds: None,
            graphic_ref: None,
            audio_cue_ref: None,
            media: None,
            audio_overrides: Vec::new(),
            notes: None,
        }
    }

    pub fn with_duration(mut self, seconds: u64) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    pub fn with_auto_advance(mut self, auto_advance: bool) -> Self {
        self.auto_advance = auto_advance;
        self
    }

    pub fn with_scene(mut self, scene: impl Into<String>) -> Self {
        self.switcher_scene = Some(scene.into());
        self
    }

    pub fn with_transition(mut self, transition: TransitionSpec) -> Self {
        self.transition = Some(transition);
        self
    }

    pub fn with_min_duration(mut self, seconds: u64) -> Self {
        self.min_duration_seconds = Some(seconds);
        self
    }

    pub fn with_max_duration(mut self, seconds: u64) -> Self {
        self.max_duration_seconds = Some(seconds);
        self
    }

    pub fn with_graphic(mut self, graphic_ref: impl Into<String>) -> Self {
        self.graphic_ref = Some(graphic_ref.into());
        self
    }

    pub fn with_audio_cue(mut self, cue_ref: impl Into<String>) -> Self {
        self.audio_cue_ref = Some(cue_ref.into());
        self
    }

    pub fn with_media(mut self, media: MediaTarget) -> Self {
        self.media = Some(media);
        self
    }

    pub fn with_audio_override(mut self, audio: AudioOverride) -> Self {
        self.audio_overrides.push(audio);
        self
    }

    pub fn is_hold(&self) -> bool {
        self.segment_type == SegmentType::Hold
    }

    pub fn is_break(&self) -> bool {
        self.segment_type == SegmentType::Break
    }

    /// Planned duration in milliseconds, if the segment has a non-zero one
    pub fn duration_ms(&self) -> Option<u64> {
        self.duration_seconds
            .filter(|secs| *secs > 0)
            .map(|secs| secs.saturating_mul(1000))
    }

    /// Minimum hold time in milliseconds (zero when unset)
    pub fn min_duration_ms(&self) -> u64 {
        self.min_duration_seconds.unwrap_or(0).saturating_mul(1000)
    }

    pub fn max_duration_ms(&self) -> Option<u64> {
        self.max_duration_seconds.map(|secs| secs.saturating_mul(1000))
    }
}

// ============================================================================
// Cameras
// ============================================================================

/// Per-camera override of health classification thresholds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthThresholds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_bitrate_kbps: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning_loss_percent: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_loss_percent: Option<f64>,
}

/// Configuration for one camera feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Unique identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// Key matching this camera's record in the stats source (e.g. stream port)
    pub stats_key: String,

    /// Apparatus codes this camera is configured to cover
    #[serde(default)]
    pub expected_apparatus: Vec<String>,

    /// Preferred substitute when this camera fails
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_camera_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_thresholds: Option<HealthThresholds>,

    /// Single-camera switcher scene; derived from the name when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene: Option<String>,
}

impl CameraConfig {
    pub fn new(id: impl Into<String>, name: impl Into<String>, stats_key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            stats_key: stats_key.into(),
            expected_apparatus: Vec::new(),
            fallback_camera_id: None,
            health_thresholds: None,
            scene: None,
        }
    }

    pub fn with_apparatus<I, S>(mut self, apparatus: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected_apparatus = apparatus.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_fallback(mut self, camera_id: impl Into<String>) -> Self {
        self.fallback_camera_id = Some(camera_id.into());
        self
    }

    pub fn with_thresholds(mut self, thresholds: HealthThresholds) -> Self {
        self.health_thresholds = Some(thresholds);
        self
    }

    pub fn with_scene(mut self, scene: impl Into<String>) -> Self {
        self.scene = Some(scene.into());
        self
    }

    /// The switcher scene that shows only this camera
    pub fn single_scene(&self) -> String {
        self.scene
            .clone()
            .unwrap_or_else(|| format!("Single - {}", self.name))
    }
}

/// Order-independent comparison of two apparatus lists
pub fn same_apparatus(a: &[String], b: &[String]) -> bool {
    let left: HashSet<&str> = a.iter().map(String::as_str).collect();
    let right: HashSet<&str> = b.iter().map(String::as_str).collect();
    left == right
}
