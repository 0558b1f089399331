//! Commands issued to the production switcher

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single well-defined switcher call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SwitcherCommand {
    /// Put a scene on program output
    SetScene { scene: String },

    /// Select the transition used for the next scene change
    SetTransition { kind: String, duration_ms: u32 },

    /// Set an input's volume in decibels
    SetInputVolume { input: String, volume_db: f64 },

    SetInputMute { input: String, muted: bool },

    /// Replace settings on an input (e.g. point a media source at a file)
    SetInputSettings {
        input: String,
        settings: serde_json::Value,
    },

    /// Restart playback on a media input
    RestartMedia { input: String },
}

impl SwitcherCommand {
    /// Short operation name for logs and error tags
    pub fn operation(&self) -> &'static str {
        match self {
            Self::SetScene { .. } => "set_scene",
            Self::SetTransition { .. } => "set_transition",
            Self::SetInputVolume { .. } => "set_input_volume",
            Self::SetInputMute { .. } => "set_input_mute",
            Self::SetInputSettings { .. } => "set_input_settings",
            Self::RestartMedia { .. } => "restart_media",
        }
    }
}

impl fmt::Display for SwitcherCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetScene { scene } => write!(f, "set_scene({scene})"),
            Self::SetTransition { kind, duration_ms } => {
                write!(f, "set_transition({kind}, {duration_ms}ms)")
            }
            Self::SetInputVolume { input, volume_db } => {
                write!(f, "set_input_volume({input}, {volume_db:.1}dB)")
            }
            Self::SetInputMute { input, muted } => write!(f, "set_input_mute({input}, {muted})"),
            Self::SetInputSettings { input, .. } => write!(f, "set_input_settings({input})"),
            Self::RestartMedia { input } => write!(f, "restart_media({input})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_serialization_is_tagged() {
        let cmd = SwitcherCommand::SetScene {
            scene: "Single - Cam 2".to_string(),
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"op\":\"set_scene\""));
        assert!(json.contains("Single - Cam 2"));
    }

    #[test]
    fn test_operation_names() {
        let cmd = SwitcherCommand::RestartMedia {
            input: "VT1".to_string(),
        };
        assert_eq!(cmd.operation(), "restart_media");
        assert_eq!(cmd.to_string(), "restart_media(VT1)");
    }
}
