//! Configuration management for showrunner
//!
//! Process-wide settings ([`AppConfig`]) come from environment variables or a
//! TOML file. Each show brings its own [`ShowConfig`] file.

pub mod show;

pub use show::{
    AudioConfig, AudioCue, GraphicsConfig, ShowConfig, StatsSourceConfig, SwitcherConfig,
    TransitionConfig,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::camera::{FallbackConfig, HealthMonitorConfig};
use crate::switcher::{HttpSwitcherConfig, PoolConfig};

/// Configuration errors surfaced to the caller
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Failed to read {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Unsupported config format: {0} (expected .toml or .json)")]
    UnsupportedFormat(String),
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub api: ApiConfig,
    pub scheduler: SchedulerSettings,
    pub health: HealthSettings,
    pub fallback: FallbackSettings,
    pub switcher: SwitcherSettings,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

/// Control API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub bind_address: String,
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: String::from("0.0.0.0:8080"),
            enable_cors: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub tick_interval_ms: u64,

    /// Start shows without issuing switcher or graphics commands
    pub rehearsal: bool,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            rehearsal: false,
        }
    }
}

/// Camera health defaults; a show's stats source may override the interval
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthSettings {
    pub poll_interval_ms: u64,
    pub reconnect_window_ms: u64,
    pub healthy_streak_ms: u64,
    pub min_bitrate_kbps: f64,
    pub warning_loss_percent: f64,
    pub critical_loss_percent: f64,
    pub request_timeout_ms: u64,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            reconnect_window_ms: 10_000,
            healthy_streak_ms: 5000,
            min_bitrate_kbps: 500.0,
            warning_loss_percent: 5.0,
            critical_loss_percent: 15.0,
            request_timeout_ms: 1500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackSettings {
    pub cooldown_ms: u64,
    pub max_depth: u32,
    pub standby_scene: String,
    pub restore_on_recovery: bool,
}

impl Default for FallbackSettings {
    fn default() -> Self {
        Self {
            cooldown_ms: 5000,
            max_depth: 2,
            standby_scene: String::from("BRB"),
            restore_on_recovery: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitcherSettings {
    pub reconnect_delay_secs: u64,
    pub request_timeout_ms: u64,
    pub keepalive_interval_secs: u64,
}

impl Default for SwitcherSettings {
    fn default() -> Self {
        Self {
            reconnect_delay_secs: 30,
            request_timeout_ms: 5000,
            keepalive_interval_secs: 10,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse::<T>().ok())
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply env overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(level) = std::env::var("SHOWRUNNER_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("SHOWRUNNER_LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(bind) = std::env::var("SHOWRUNNER_BIND") {
            self.api.bind_address = bind;
        }
        if let Some(cors) = env_parse("SHOWRUNNER_ENABLE_CORS") {
            self.api.enable_cors = cors;
        }
        if let Some(rehearsal) = env_parse("SHOWRUNNER_REHEARSAL") {
            self.scheduler.rehearsal = rehearsal;
        }
        if let Some(ms) = env_parse("SHOWRUNNER_HEALTH_POLL_MS") {
            self.health.poll_interval_ms = ms;
        }
        if let Some(ms) = env_parse("SHOWRUNNER_FALLBACK_COOLDOWN_MS") {
            self.fallback.cooldown_ms = ms;
        }
        if let Ok(scene) = std::env::var("SHOWRUNNER_STANDBY_SCENE") {
            self.fallback.standby_scene = scene;
        }
        if let Some(secs) = env_parse("SHOWRUNNER_RECONNECT_DELAY_SECS") {
            self.switcher.reconnect_delay_secs = secs;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.tick_interval_ms == 0 {
            anyhow::bail!("scheduler.tick_interval_ms must be greater than 0");
        }

        if self.health.poll_interval_ms == 0 {
            anyhow::bail!("health.poll_interval_ms must be greater than 0");
        }

        if self.health.warning_loss_percent > self.health.critical_loss_percent {
            anyhow::bail!("health.warning_loss_percent must not exceed critical_loss_percent");
        }

        if self.fallback.standby_scene.trim().is_empty() {
            anyhow::bail!("fallback.standby_scene must not be empty");
        }

        if self.switcher.reconnect_delay_secs == 0 {
            anyhow::bail!("switcher.reconnect_delay_secs must be greater than 0");
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!("logging.format must be 'text' or 'json'");
        }

        Ok(())
    }

    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.scheduler.tick_interval_ms)
    }

    /// Health monitor settings, with the show's poll interval when it has one
    pub fn health_monitor_config(&self, show: Option<&StatsSourceConfig>) -> HealthMonitorConfig {
        let poll_ms = show
            .map(|s| s.poll_interval_ms)
            .unwrap_or(self.health.poll_interval_ms);

        HealthMonitorConfig::builder()
            .poll_interval(Duration::from_millis(poll_ms))
            .reconnect_window(Duration::from_millis(self.health.reconnect_window_ms))
            .healthy_streak(Duration::from_millis(self.health.healthy_streak_ms))
            .min_bitrate_kbps(self.health.min_bitrate_kbps)
            .warning_loss_percent(self.health.warning_loss_percent)
            .critical_loss_percent(self.health.critical_loss_percent)
            .build()
    }

    /// Fallback policy, with the show's standby scene when it has one
    pub fn fallback_config(&self, standby_scene: Option<&str>) -> FallbackConfig {
        FallbackConfig {
            cooldown: Duration::from_millis(self.fallback.cooldown_ms),
            max_fallback_depth: self.fallback.max_depth,
            standby_scene: standby_scene
                .unwrap_or(&self.fallback.standby_scene)
                .to_string(),
            restore_on_recovery: self.fallback.restore_on_recovery,
        }
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            reconnect_delay: Duration::from_secs(self.switcher.reconnect_delay_secs),
            ..PoolConfig::default()
        }
    }

    pub fn http_switcher_config(&self) -> HttpSwitcherConfig {
        HttpSwitcherConfig {
            timeout: Duration::from_millis(self.switcher.request_timeout_ms),
            keepalive_interval: Duration::from_secs(self.switcher.keepalive_interval_secs),
        }
    }

    pub fn stats_request_timeout(&self) -> Duration {
        Duration::from_millis(self.health.request_timeout_ms)
    }
}
