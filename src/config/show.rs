//! Per-show configuration
//!
//! A show is described by its run-of-show segments, its cameras and the
//! external endpoints it talks to. Files may be TOML or JSON; the format is
//! picked from the extension.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use super::ConfigError;
use crate::models::{CameraConfig, Segment, TransitionSpec};

/// Longest duration, minimum or maximum a segment may declare
pub const MAX_SEGMENT_SECONDS: u64 = 24 * 60 * 60;

/// Transitions applied when a segment doesn't name its own
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionConfig {
    /// Used for every change without a more specific rule
    #[serde(default)]
    pub default: Option<TransitionSpec>,

    /// Entering a break from a non-break segment
    #[serde(default)]
    pub into_break: Option<TransitionSpec>,

    /// Leaving a break
    #[serde(default)]
    pub out_of_break: Option<TransitionSpec>,
}

/// A named audio cue segments can reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioCue {
    /// Media input that plays the cue
    pub input_name: String,

    #[serde(default)]
    pub file: Option<String>,

    /// Linear volume 0.0..=1.0
    #[serde(default)]
    pub volume: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(default)]
    pub cues: HashMap<String, AudioCue>,
}

/// Where camera stream stats are polled from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSourceConfig {
    pub host: String,
    pub port: u16,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Request path, `/stats` when unset
    #[serde(default)]
    pub path: Option<String>,
}

fn default_poll_interval_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitcherConfig {
    /// Switcher (bridge) address, `host:port` or a URL
    pub address: String,
}

/// Webhook that receives graphic triggers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphicsConfig {
    pub webhook_url: String,

    #[serde(default = "default_graphics_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_graphics_timeout_ms() -> u64 {
    2000
}

/// Everything the runtime needs to run one show
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowConfig {
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub segments: Vec<Segment>,

    #[serde(default)]
    pub cameras: Vec<CameraConfig>,

    #[serde(default)]
    pub transitions: Option<TransitionConfig>,

    #[serde(default)]
    pub audio: Option<AudioConfig>,

    #[serde(default)]
    pub stats_source: Option<StatsSourceConfig>,

    #[serde(default)]
    pub switcher: Option<SwitcherConfig>,

    #[serde(default)]
    pub graphics: Option<GraphicsConfig>,

    /// Overrides the process-wide standby scene for this show
    #[serde(default)]
    pub standby_scene: Option<String>,
}

impl ShowConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            segments: Vec::new(),
            cameras: Vec::new(),
            transitions: None,
            audio: None,
            stats_source: None,
            switcher: None,
            graphics: None,
            standby_scene: None,
        }
    }

    pub fn with_segments(mut self, segments: Vec<Segment>) -> Self {
        self.segments = segments;
        self
    }

    pub fn with_cameras(mut self, cameras: Vec<CameraConfig>) -> Self {
        self.cameras = cameras;
        self
    }

    pub fn with_transitions(mut self, transitions: TransitionConfig) -> Self {
        self.transitions = Some(transitions);
        self
    }

    pub fn with_audio(mut self, audio: AudioConfig) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn with_switcher(mut self, address: impl Into<String>) -> Self {
        self.switcher = Some(SwitcherConfig {
            address: address.into(),
        });
        self
    }

    /// Load and validate a show file (`.toml` or `.json`)
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            Some("json") => Self::from_json_str(&content),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }?;

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn audio_cue(&self, cue_ref: &str) -> Option<&AudioCue> {
        self.audio.as_ref().and_then(|a| a.cues.get(cue_ref))
    }

    pub fn camera(&self, camera_id: &str) -> Option<&CameraConfig> {
        self.cameras.iter().find(|c| c.id == camera_id)
    }

    /// Check references and bounds
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::invalid("id", "Show id must not be empty"));
        }

        let mut segment_ids = HashSet::new();
        for segment in &self.segments {
            if segment.id.trim().is_empty() {
                return Err(ConfigError::invalid("segments.id", "Segment id must not be empty"));
            }
            if !segment_ids.insert(segment.id.as_str()) {
                return Err(ConfigError::invalid(
                    "segments.id",
                    format!("Duplicate segment id '{}'", segment.id),
                ));
            }

            for (field, value) in [
                ("segments.duration_seconds", segment.duration_seconds),
                ("segments.min_duration_seconds", segment.min_duration_seconds),
                ("segments.max_duration_seconds", segment.max_duration_seconds),
            ] {
                if value.is_some_and(|secs| secs > MAX_SEGMENT_SECONDS) {
                    return Err(ConfigError::invalid(
                        field,
                        format!(
                            "Segment '{}' exceeds the {MAX_SEGMENT_SECONDS}s limit",
                            segment.id
                        ),
                    ));
                }
            }

            if let (Some(min), Some(max)) =
                (segment.min_duration_seconds, segment.max_duration_seconds)
            {
                if min > max {
                    return Err(ConfigError::invalid(
                        "segments.min_duration_seconds",
                        format!("Segment '{}' minimum {min}s exceeds maximum {max}s", segment.id),
                    ));
                }
            }

            if let Some(cue_ref) = &segment.audio_cue_ref {
                if self.audio_cue(cue_ref).is_none() {
                    return Err(ConfigError::invalid(
                        "segments.audio_cue_ref",
                        format!("Segment '{}' references unknown audio cue '{cue_ref}'", segment.id),
                    ));
                }
            }

            if let Some(volume) = segment.audio_overrides.iter().find_map(|a| a.volume) {
                if !(0.0..=1.0).contains(&volume) {
                    return Err(ConfigError::invalid(
                        "segments.audio_overrides.volume",
                        format!("Segment '{}' volume {volume} outside 0.0..=1.0", segment.id),
                    ));
                }
            }
        }

        let mut camera_ids = HashSet::new();
        for camera in &self.cameras {
            if !camera_ids.insert(camera.id.as_str()) {
                return Err(ConfigError::invalid(
                    "cameras.id",
                    format!("Duplicate camera id '{}'", camera.id),
                ));
            }
        }

        for camera in &self.cameras {
            if let Some(fallback) = &camera.fallback_camera_id {
                if fallback == &camera.id {
                    return Err(ConfigError::invalid(
                        "cameras.fallback_camera_id",
                        format!("Camera '{}' cannot be its own fallback", camera.id),
                    ));
                }
                if !camera_ids.contains(fallback.as_str()) {
                    return Err(ConfigError::invalid(
                        "cameras.fallback_camera_id",
                        format!("Camera '{}' falls back to unknown camera '{fallback}'", camera.id),
                    ));
                }
            }

            if let Some(t) = &camera.health_thresholds {
                if let (Some(warning), Some(critical)) = (t.warning_loss_percent, t.critical_loss_percent) {
                    if warning > critical {
                        return Err(ConfigError::invalid(
                            "cameras.health_thresholds",
                            format!("Camera '{}' warning loss exceeds critical loss", camera.id),
                        ));
                    }
                }
            }
        }

        if let Some(stats) = &self.stats_source {
            if stats.poll_interval_ms == 0 {
                return Err(ConfigError::invalid(
                    "stats_source.poll_interval_ms",
                    "Must be greater than 0",
                ));
            }
        }

        if let Some(switcher) = &self.switcher {
            if switcher.address.trim().is_empty() {
                return Err(ConfigError::invalid("switcher.address", "Must not be empty"));
            }
        }

        if let Some(graphics) = &self.graphics {
            if !graphics.webhook_url.starts_with("http://")
                && !graphics.webhook_url.starts_with("https://")
            {
                return Err(ConfigError::invalid(
                    "graphics.webhook_url",
                    "Must be an http(s) URL",
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SegmentType;

    const SHOW_TOML: &str = r#"
id = "finals"
name = "Floor Finals"
standby_scene = "Please Stand By"

[switcher]
address = "127.0.0.1:4455"

[stats_source]
host = "127.0.0.1"
port = 8181

[transitions.default]
kind = "Fade"
duration_ms = 300

[audio.cues.sting]
input_name = "SFX"
file = "/media/sting.wav"

[[segments]]
id = "open"
name = "Opening"
type = "video"
duration_seconds = 30
media = { input_name = "VT", file = "/media/open.mp4" }
audio_cue_ref = "sting"

[[segments]]
id = "hold"
name = "Judges"
type = "hold"
min_duration_seconds = 10
max_duration_seconds = 120

[[cameras]]
id = "cam1"
name = "Cam 1"
stats_key = "9001"
expected_apparatus = ["FX"]
fallback_camera_id = "cam2"

[[cameras]]
id = "cam2"
name = "Cam 2"
stats_key = "9002"
"#;

    #[test]
    fn test_parse_toml_show() {
        let show = ShowConfig::from_toml_str(SHOW_TOML).unwrap();
        show.validate().unwrap();

        assert_eq!(show.display_name(), "Floor Finals");
        assert_eq!(show.segments.len(), 2);
        assert_eq!(show.segments[0].segment_type, SegmentType::Video);
        assert!(show.segments[0].auto_advance);
        assert_eq!(show.segments[1].min_duration_seconds, Some(10));
        assert_eq!(show.stats_source.as_ref().unwrap().poll_interval_ms, 2000);
        assert_eq!(show.audio_cue("sting").unwrap().input_name, "SFX");
        assert_eq!(
            show.transitions.unwrap().default,
            Some(TransitionSpec::new("Fade", 300))
        );
    }

    #[test]
    fn test_duplicate_segment_ids_rejected() {
        let show = ShowConfig::new("s").with_segments(vec![
            Segment::new("a", "One", SegmentType::Live),
            Segment::new("a", "Two", SegmentType::Live),
        ]);
        assert!(matches!(show.validate(), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_fallback_references_checked() {
        let own = ShowConfig::new("s")
            .with_cameras(vec![CameraConfig::new("cam1", "Cam 1", "1").with_fallback("cam1")]);
        assert!(own.validate().is_err());

        let dangling = ShowConfig::new("s")
            .with_cameras(vec![CameraConfig::new("cam1", "Cam 1", "1").with_fallback("cam7")]);
        assert!(dangling.validate().is_err());
    }

    #[test]
    fn test_hold_bounds_and_cue_refs_checked() {
        let bad_bounds = ShowConfig::new("s").with_segments(vec![Segment::new(
            "h",
            "Hold",
            SegmentType::Hold,
        )
        .with_min_duration(60)
        .with_max_duration(30)]);
        assert!(bad_bounds.validate().is_err());

        let bad_cue = ShowConfig::new("s").with_segments(vec![
            Segment::new("a", "One", SegmentType::Live).with_audio_cue("missing")
        ]);
        assert!(bad_cue.validate().is_err());
    }

    #[test]
    fn test_oversized_durations_rejected() {
        let day = ShowConfig::new("s").with_segments(vec![
            Segment::new("a", "One", SegmentType::Live).with_duration(MAX_SEGMENT_SECONDS)
        ]);
        assert!(day.validate().is_ok());

        let huge = ShowConfig::new("s").with_segments(vec![
            Segment::new("a", "One", SegmentType::Live).with_duration(u64::MAX / 100)
        ]);
        assert!(matches!(
            huge.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));

        let huge_hold = ShowConfig::new("s").with_segments(vec![Segment::new(
            "h",
            "Hold",
            SegmentType::Hold,
        )
        .with_max_duration(MAX_SEGMENT_SECONDS + 1)]);
        assert!(huge_hold.validate().is_err());
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let toml_path = dir.path().join("show.toml");
        std::fs::write(&toml_path, SHOW_TOML).unwrap();
        assert_eq!(ShowConfig::load(&toml_path).unwrap().id, "finals");

        let json_path = dir.path().join("show.json");
        std::fs::write(
            &json_path,
            r#"{"id":"heats","segments":[{"id":"a","name":"A","type":"live","duration_seconds":5}]}"#,
        )
        .unwrap();
        assert_eq!(ShowConfig::load(&json_path).unwrap().segments.len(), 1);

        let yaml_path = dir.path().join("show.yaml");
        std::fs::write(&yaml_path, "id: x").unwrap();
        assert!(matches!(
            ShowConfig::load(&yaml_path),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }
}
