//! Loading process settings and show files from disk

use showrunner::config::{AppConfig, ConfigError, ShowConfig};
use showrunner::models::SegmentType;
use std::io::Write;
use tempfile::{Builder, NamedTempFile};

fn write_temp(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_load_toml_show() {
    let file = write_temp(
        ".toml",
        r#"
id = "beam-final"
name = "Beam Final"

[switcher]
address = "10.0.0.5:4455"

[graphics]
webhook_url = "http://gfx.local/trigger"

[[segments]]
id = "intro"
name = "Intro"
type = "live"
duration_seconds = 15
switcher_scene = "Wide"

[[segments]]
id = "scores"
name = "Scores"
type = "hold"
min_duration_seconds = 5

[[cameras]]
id = "cam1"
name = "Beam Left"
stats_key = "9001"
expected_apparatus = ["BB"]
"#,
    );

    let show = ShowConfig::load(file.path()).unwrap();
    assert_eq!(show.display_name(), "Beam Final");
    assert_eq!(show.segments[1].segment_type, SegmentType::Hold);
    assert_eq!(show.graphics.as_ref().unwrap().timeout_ms, 2000);
    assert_eq!(show.cameras[0].single_scene(), "Single - Beam Left");
}

#[test]
fn test_load_json_show() {
    let file = write_temp(
        ".json",
        r#"{
            "id": "heats",
            "segments": [
                { "id": "a", "name": "A", "type": "break", "duration_seconds": 60 }
            ]
        }"#,
    );

    let show = ShowConfig::load(file.path()).unwrap();
    assert_eq!(show.display_name(), "heats");
    assert!(show.segments[0].is_break());
}

#[test]
fn test_invalid_show_rejected_on_load() {
    let file = write_temp(
        ".toml",
        r#"
id = "finals"

[[cameras]]
id = "cam1"
name = "Cam 1"
stats_key = "1"
fallback_camera_id = "cam9"
"#,
    );

    assert!(matches!(
        ShowConfig::load(file.path()),
        Err(ConfigError::InvalidValue { .. })
    ));
}

#[test]
fn test_unsupported_extension() {
    let file = write_temp(".yaml", "id: finals\n");
    assert!(matches!(
        ShowConfig::load(file.path()),
        Err(ConfigError::UnsupportedFormat(_))
    ));
}

#[test]
fn test_missing_show_file() {
    let err = ShowConfig::load(std::path::Path::new("/nonexistent/show.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn test_load_app_config() {
    let file = write_temp(
        ".toml",
        r#"
[api]
bind_address = "127.0.0.1:9090"

[health]
healthy_streak_ms = 8000

[fallback]
standby_scene = "Technical Difficulties"
"#,
    );

    let settings = AppConfig::from_file(file.path()).unwrap();
    settings.validate().unwrap();
    assert_eq!(settings.health.healthy_streak_ms, 8000);
    // Unset fields keep their defaults
    assert_eq!(settings.health.poll_interval_ms, 2000);

    let fallback = settings.fallback_config(None);
    assert_eq!(fallback.standby_scene, "Technical Difficulties");
    assert_eq!(
        settings.fallback_config(Some("BRB")).standby_scene,
        "BRB"
    );
}

#[test]
fn test_app_config_rejects_bad_values() {
    let file = write_temp(
        ".toml",
        r#"
[scheduler]
tick_interval_ms = 0
"#,
    );

    let settings = AppConfig::from_file(file.path()).unwrap();
    assert!(settings.validate().is_err());
}
