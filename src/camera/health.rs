//! Camera health monitoring
//!
//! Polls a [`StatsSource`] on a fixed interval and turns raw stream stats into
//! a stable per-camera [`HealthStatus`]. Only transitions are announced as
//! [`HealthEvent::StatusChanged`]; every poll also publishes the full state of
//! each camera as [`HealthEvent::CameraHealth`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::time::Instant;

use super::stats::{StatsSource, StreamStats};
use crate::metrics;
use crate::models::{CameraConfig, HealthThresholds};
use crate::utils::PeriodicTask;

// ============================================================================
// Status & state
// ============================================================================

/// Health classification of a camera feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Reconnecting,
    Offline,
    /// Not polled yet
    Unknown,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Reconnecting => "reconnecting",
            Self::Offline => "offline",
            Self::Unknown => "unknown",
        }
    }

    /// Statuses that warrant taking the camera off air
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Reconnecting | Self::Offline)
    }

    /// Numeric value exported to the status gauge
    pub fn gauge_value(&self) -> f64 {
        match self {
            Self::Healthy => 0.0,
            Self::Degraded => 1.0,
            Self::Reconnecting => 2.0,
            Self::Offline => 3.0,
            Self::Unknown => -1.0,
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last evaluated health of one camera
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CameraHealthState {
    pub camera_id: String,
    pub status: HealthStatus,
    pub bitrate_kbps: f64,
    pub loss_percent: f64,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub last_healthy_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
}

impl CameraHealthState {
    fn new(camera_id: &str) -> Self {
        Self {
            camera_id: camera_id.to_string(),
            status: HealthStatus::Unknown,
            bitrate_kbps: 0.0,
            loss_percent: 0.0,
            last_seen_at: None,
            last_healthy_at: None,
            consecutive_failures: 0,
        }
    }
}

/// Notifications published by the monitor
#[derive(Debug, Clone, PartialEq)]
pub enum HealthEvent {
    /// Full state of one camera after a poll
    CameraHealth(CameraHealthState),

    StatusChanged {
        camera_id: String,
        previous: HealthStatus,
        current: HealthStatus,
    },

    /// The stats source could not be read this cycle
    PollError { error: String },
}

// ============================================================================
// Configuration
// ============================================================================

/// Monitor configuration
#[derive(Debug, Clone)]
pub struct HealthMonitorConfig {
    pub poll_interval: Duration,

    /// How long a camera without stats counts as reconnecting before offline
    pub reconnect_window: Duration,

    /// Clean time required before a recovering camera is healthy again
    pub healthy_streak: Duration,

    pub min_bitrate_kbps: f64,
    pub warning_loss_percent: f64,
    pub critical_loss_percent: f64,

    pub event_channel_capacity: usize,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            reconnect_window: Duration::from_secs(10),
            healthy_streak: Duration::from_secs(5),
            min_bitrate_kbps: 500.0,
            warning_loss_percent: 5.0,
            critical_loss_percent: 15.0,
            event_channel_capacity: 256,
        }
    }
}

impl HealthMonitorConfig {
    pub fn builder() -> HealthMonitorConfigBuilder {
        HealthMonitorConfigBuilder::default()
    }
}

/// Builder for HealthMonitorConfig
#[derive(Debug, Default)]
pub struct HealthMonitorConfigBuilder {
    poll_interval: Option<Duration>,
    reconnect_window: Option<Duration>,
    healthy_streak: Option<Duration>,
    min_bitrate_kbps: Option<f64>,
    warning_loss_percent: Option<f64>,
    critical_loss_percent: Option<f64>,
    event_channel_capacity: Option<usize>,
}

impl HealthMonitorConfigBuilder {
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn reconnect_window(mut self, window: Duration) -> Self {
        self.reconnect_window = Some(window);
        self
    }

    pub fn healthy_streak(mut self, streak: Duration) -> Self {
        self.healthy_streak = Some(streak);
        self
    }

    pub fn min_bitrate_kbps(mut self, kbps: f64) -> Self {
        self.min_bitrate_kbps = Some(kbps);
        self
    }

    pub fn warning_loss_percent(mut self, percent: f64) -> Self {
        self.warning_loss_percent = Some(percent);
        self
    }

    pub fn critical_loss_percent(mut self, percent: f64) -> Self {
        self.critical_loss_percent = Some(percent);
        self
    }

    pub fn event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = Some(capacity);
        self
    }

    pub fn build(self) -> HealthMonitorConfig {
        let defaults = HealthMonitorConfig::default();
        HealthMonitorConfig {
            poll_interval: self.poll_interval.unwrap_or(defaults.poll_interval),
            reconnect_window: self.reconnect_window.unwrap_or(defaults.reconnect_window),
            healthy_streak: self.healthy_streak.unwrap_or(defaults.healthy_streak),
            min_bitrate_kbps: self.min_bitrate_kbps.unwrap_or(defaults.min_bitrate_kbps),
            warning_loss_percent: self
                .warning_loss_percent
                .unwrap_or(defaults.warning_loss_percent),
            critical_loss_percent: self
                .critical_loss_percent
                .unwrap_or(defaults.critical_loss_percent),
            event_channel_capacity: self
                .event_channel_capacity
                .unwrap_or(defaults.event_channel_capacity),
        }
    }
}

/// Thresholds after applying a camera's overrides
#[derive(Debug, Clone, Copy)]
struct Limits {
    min_bitrate_kbps: f64,
    warning_loss_percent: f64,
    critical_loss_percent: f64,
}

impl Limits {
    fn resolve(config: &HealthMonitorConfig, overrides: Option<&HealthThresholds>) -> Self {
        let overrides = overrides.cloned().unwrap_or_default();
        Self {
            min_bitrate_kbps: overrides.min_bitrate_kbps.unwrap_or(config.min_bitrate_kbps),
            warning_loss_percent: overrides
                .warning_loss_percent
                .unwrap_or(config.warning_loss_percent),
            critical_loss_percent: overrides
                .critical_loss_percent
                .unwrap_or(config.critical_loss_percent),
        }
    }

    /// Raw classification of a sample, before hysteresis
    fn classify(&self, stats: &StreamStats) -> HealthStatus {
        let loss = stats.loss_percent.unwrap_or(0.0);

        if loss > self.critical_loss_percent {
            HealthStatus::Reconnecting
        } else if stats
            .bitrate_kbps
            .is_some_and(|kbps| kbps < self.min_bitrate_kbps)
        {
            HealthStatus::Degraded
        } else if loss > self.warning_loss_percent {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}

// ============================================================================
// Monitor
// ============================================================================

struct Tracker {
    state: CameraHealthState,
    last_seen: Option<Instant>,
    /// Set while a camera climbs back from reconnecting/offline
    recovery_started: Option<Instant>,
}

impl Tracker {
    fn new(camera_id: &str) -> Self {
        Self {
            state: CameraHealthState::new(camera_id),
            last_seen: None,
            recovery_started: None,
        }
    }

    fn evaluate(
        &mut self,
        config: &HealthMonitorConfig,
        limits: Limits,
        stats: Option<&StreamStats>,
        now: Instant,
        wall: DateTime<Utc>,
    ) -> HealthStatus {
        let previous = self.state.status;

        let raw = match stats {
            Some(stats) => {
                self.last_seen = Some(now);
                self.state.last_seen_at = Some(wall);
                self.state.bitrate_kbps = stats.bitrate_kbps.unwrap_or(0.0);
                self.state.loss_percent = stats.loss_percent.unwrap_or(0.0);
                limits.classify(stats)
            }
            None => {
                self.state.bitrate_kbps = 0.0;
                match self.last_seen {
                    Some(seen) if now.duration_since(seen) <= config.reconnect_window => {
                        HealthStatus::Reconnecting
                    }
                    _ => HealthStatus::Offline,
                }
            }
        };

        let status = match raw {
            HealthStatus::Healthy => {
                if previous.is_failure() {
                    self.recovery_started = Some(now);
                }
                match self.recovery_started {
                    Some(start) if now.duration_since(start) < config.healthy_streak => {
                        HealthStatus::Degraded
                    }
                    _ => {
                        self.recovery_started = None;
                        HealthStatus::Healthy
                    }
                }
            }
            other => {
                self.recovery_started = None;
                other
            }
        };

        if status == HealthStatus::Healthy {
            self.state.consecutive_failures = 0;
            self.state.last_healthy_at = Some(wall);
        } else {
            self.state.consecutive_failures = self.state.consecutive_failures.saturating_add(1);
        }
        self.state.status = status;

        previous
    }
}

/// Polls stream stats and classifies camera health
pub struct CameraHealthMonitor {
    config: HealthMonitorConfig,
    source: Arc<dyn StatsSource>,
    cameras: RwLock<Vec<CameraConfig>>,
    trackers: RwLock<HashMap<String, Tracker>>,
    /// Serialises polls so the loop and a manual poll never interleave
    poll_lock: Mutex<()>,
    poll_task: Mutex<Option<PeriodicTask>>,
    event_tx: broadcast::Sender<HealthEvent>,
    self_ref: Weak<CameraHealthMonitor>,
}

impl CameraHealthMonitor {
    pub fn new(
        config: HealthMonitorConfig,
        cameras: Vec<CameraConfig>,
        source: Arc<dyn StatsSource>,
    ) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity.max(1));
        let trackers: HashMap<String, Tracker> = cameras
            .iter()
            .map(|c| (c.id.clone(), Tracker::new(&c.id)))
            .collect();

        Arc::new_cyclic(|self_ref| Self {
            config,
            source,
            cameras: RwLock::new(cameras),
            trackers: RwLock::new(trackers),
            poll_lock: Mutex::new(()),
            poll_task: Mutex::new(None),
            event_tx,
            self_ref: self_ref.clone(),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HealthEvent> {
        self.event_tx.subscribe()
    }

    pub fn config(&self) -> &HealthMonitorConfig {
        &self.config
    }

    /// Start the poll loop; no-op when already running
    pub async fn start(&self) {
        let mut task = self.poll_task.lock().await;
        if task.is_some() {
            return;
        }

        let monitor = self.self_ref.clone();
        *task = Some(PeriodicTask::spawn(
            "camera-health-poll",
            self.config.poll_interval,
            move || {
                let monitor = monitor.clone();
                async move {
                    if let Some(monitor) = monitor.upgrade() {
                        monitor.poll_health().await;
                    }
                }
            },
        ));

        tracing::info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            source = %self.source.describe(),
            "Camera health monitor started"
        );
    }

    pub async fn stop(&self) {
        if let Some(task) = self.poll_task.lock().await.take() {
            task.cancel();
            tracing::info!("Camera health monitor stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.poll_task.lock().await.is_some()
    }

    /// Run one fetch-evaluate-publish cycle and return every camera's state
    pub async fn poll_health(&self) -> Vec<CameraHealthState> {
        let _poll = self.poll_lock.lock().await;
        let _timer = metrics::start_poll_timer();

        let stats: HashMap<String, StreamStats> = match self.source.fetch().await {
            Ok(batch) => batch.into_iter().map(|s| (s.key.clone(), s)).collect(),
            Err(e) => {
                tracing::warn!(source = %self.source.describe(), error = %e, "Camera stats poll failed");
                let _ = self.event_tx.send(HealthEvent::PollError {
                    error: e.to_string(),
                });
                HashMap::new()
            }
        };

        let now = Instant::now();
        let wall = Utc::now();
        let cameras = self.cameras.read().await.clone();

        let mut states = Vec::with_capacity(cameras.len());
        let mut changes = Vec::new();
        {
            let mut trackers = self.trackers.write().await;
            for camera in &cameras {
                let tracker = trackers
                    .entry(camera.id.clone())
                    .or_insert_with(|| Tracker::new(&camera.id));
                let limits = Limits::resolve(&self.config, camera.health_thresholds.as_ref());

                let previous = tracker.evaluate(
                    &self.config,
                    limits,
                    stats.get(&camera.stats_key),
                    now,
                    wall,
                );

                let current = tracker.state.status;
                if previous != current {
                    changes.push((camera.id.clone(), previous, current));
                }
                states.push(tracker.state.clone());
            }
        }

        for state in &states {
            metrics::set_camera_status(&state.camera_id, state.status.gauge_value());
            let _ = self.event_tx.send(HealthEvent::CameraHealth(state.clone()));
        }

        for (camera_id, previous, current) in changes {
            if current.is_failure() {
                tracing::warn!(camera_id = %camera_id, from = %previous, to = %current, "Camera status changed");
            } else {
                tracing::info!(camera_id = %camera_id, from = %previous, to = %current, "Camera status changed");
            }
            let _ = self.event_tx.send(HealthEvent::StatusChanged {
                camera_id,
                previous,
                current,
            });
        }

        states
    }

    /// States of every configured camera, in configuration order
    pub async fn get_all_health(&self) -> Vec<CameraHealthState> {
        let cameras = self.cameras.read().await;
        let trackers = self.trackers.read().await;
        cameras
            .iter()
            .filter_map(|c| trackers.get(&c.id).map(|t| t.state.clone()))
            .collect()
    }

    pub async fn get_camera_health(&self, camera_id: &str) -> Option<CameraHealthState> {
        self.trackers
            .read()
            .await
            .get(camera_id)
            .map(|t| t.state.clone())
    }

    /// Ids of cameras currently classified healthy, in configuration order
    pub async fn get_healthy_cameras(&self) -> Vec<String> {
        self.get_all_health()
            .await
            .into_iter()
            .filter(|s| s.status == HealthStatus::Healthy)
            .map(|s| s.camera_id)
            .collect()
    }

    pub async fn is_healthy(&self, camera_id: &str) -> bool {
        self.trackers
            .read()
            .await
            .get(camera_id)
            .is_some_and(|t| t.state.status == HealthStatus::Healthy)
    }

    /// Swap the camera list, keeping state for cameras that survive
    pub async fn update_config(&self, cameras: Vec<CameraConfig>) {
        let mut trackers = self.trackers.write().await;
        trackers.retain(|id, _| cameras.iter().any(|c| &c.id == id));
        for camera in &cameras {
            trackers
                .entry(camera.id.clone())
                .or_insert_with(|| Tracker::new(&camera.id));
        }
        drop(trackers);

        let count = cameras.len();
        *self.cameras.write().await = cameras;
        tracing::info!(cameras = count, "Camera health configuration updated");
    }
}
