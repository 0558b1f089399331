//! Camera fallback selection and switching
//!
//! When a camera fails the manager picks the best healthy substitute and puts
//! its single-camera scene on program. If nothing acceptable is left, the
//! standby scene goes up instead; a dead or wrong feed is never left on air.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::time::Instant;

use super::error::{FallbackError, FallbackResult};
use super::health::CameraHealthMonitor;
use super::runtime::CameraRuntimeState;
use crate::metrics;
use crate::models::{CameraConfig, Segment};
use crate::switcher::SwitcherConnectionPool;
use crate::utils::duration_ms;

// ============================================================================
// Configuration & records
// ============================================================================

/// Fallback policy
#[derive(Debug, Clone)]
pub struct FallbackConfig {
    /// Minimum time between two switches for the same original camera
    pub cooldown: Duration,

    /// Longest allowed fallback-of-fallback chain
    pub max_fallback_depth: u32,

    /// Scene shown when no acceptable camera is available
    pub standby_scene: String,

    /// Switch back to a camera's own scene when it recovers
    pub restore_on_recovery: bool,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(5),
            max_fallback_depth: 2,
            standby_scene: "BRB".to_string(),
            restore_on_recovery: true,
        }
    }
}

/// What a failed camera was replaced with
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "camera_id", rename_all = "lowercase")]
pub enum FallbackTarget {
    Camera(String),
    Standby,
}

/// An active substitution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallbackRecord {
    pub original_camera_id: String,
    pub target: FallbackTarget,
    pub reason: String,
    pub activated_at: DateTime<Utc>,
    pub depth: u32,
    /// Scene issued to the switcher
    pub scene: String,
    /// Segment on air when the fallback was taken
    pub segment_id: Option<String>,
}

impl FallbackRecord {
    pub fn fallback_camera_id(&self) -> Option<&str> {
        match &self.target {
            FallbackTarget::Camera(id) => Some(id),
            FallbackTarget::Standby => None,
        }
    }
}

/// Why standby was chosen over a camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StandbyReason {
    NoHealthyCamera,
    ChainExhausted,
}

/// Result of a successful failure handling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackOutcome {
    Activated {
        fallback_camera_id: String,
        scene: String,
    },
    Standby {
        scene: String,
        reason: StandbyReason,
    },
}

/// Notifications published by the manager
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackEvent {
    Activated {
        original_camera_id: String,
        target: FallbackTarget,
        scene: String,
        reason: String,
        depth: u32,
    },
    Cleared {
        camera_id: String,
        switched_back: bool,
    },
    /// No healthy camera; standby is on air
    Unavailable {
        camera_id: String,
        standby_scene: String,
    },
    ChainExhausted {
        camera_id: String,
        depth: u32,
        max_depth: u32,
    },
    /// The scene switch failed; the record stays active
    CommandFailed {
        camera_id: String,
        scene: String,
        error: String,
    },
}

// ============================================================================
// Manager
// ============================================================================

struct Inner {
    cameras: Vec<CameraConfig>,
    records: HashMap<String, FallbackRecord>,
    last_switch: HashMap<String, Instant>,
}

impl Inner {
    fn camera(&self, camera_id: &str) -> Option<&CameraConfig> {
        self.cameras.iter().find(|c| c.id == camera_id)
    }

    /// Cameras already substituting for `camera_id`'s replacements
    ///
    /// The camera's own record is skipped so that re-asserting a fallback can
    /// keep its current substitute.
    fn downstream(&self, camera_id: &str) -> HashSet<String> {
        let mut seen = HashSet::new();
        let mut visited = HashSet::from([camera_id.to_string()]);

        let mut next = self
            .records
            .get(camera_id)
            .and_then(|r| r.fallback_camera_id())
            .and_then(|first| self.records.get(first))
            .and_then(|r| r.fallback_camera_id())
            .map(str::to_string);

        while let Some(current) = next {
            if !visited.insert(current.clone()) {
                break;
            }
            seen.insert(current.clone());
            next = self
                .records
                .get(&current)
                .and_then(|r| r.fallback_camera_id())
                .map(str::to_string);
        }
        seen
    }

    /// Cameras whose failure (transitively) led to `camera_id` being on air
    fn upstream(&self, camera_id: &str) -> HashSet<String> {
        let mut seen = HashSet::new();
        let mut frontier = vec![camera_id.to_string()];

        while let Some(current) = frontier.pop() {
            for record in self.records.values() {
                if record.fallback_camera_id() == Some(current.as_str())
                    && record.original_camera_id != camera_id
                    && seen.insert(record.original_camera_id.clone())
                {
                    frontier.push(record.original_camera_id.clone());
                }
            }
        }
        seen
    }

    /// Every camera that must not be chosen as `camera_id`'s substitute
    fn chain(&self, camera_id: &str) -> HashSet<String> {
        let mut chain = self.downstream(camera_id);
        chain.extend(self.upstream(camera_id));
        chain.insert(camera_id.to_string());
        chain
    }

    /// Depth a new record for `camera_id` would have
    fn depth_for(&self, camera_id: &str) -> u32 {
        self.records
            .values()
            .filter(|r| r.fallback_camera_id() == Some(camera_id))
            .filter(|r| r.original_camera_id != camera_id)
            .map(|r| r.depth)
            .max()
            .unwrap_or(0)
            + 1
    }
}

/// Picks and switches to substitute cameras for one show
pub struct CameraFallbackManager {
    show_id: String,
    config: FallbackConfig,
    health: Arc<CameraHealthMonitor>,
    runtime: Arc<CameraRuntimeState>,
    pool: Arc<SwitcherConnectionPool>,
    inner: Mutex<Inner>,
    event_tx: broadcast::Sender<FallbackEvent>,
}

impl CameraFallbackManager {
    pub fn new(
        show_id: impl Into<String>,
        config: FallbackConfig,
        cameras: Vec<CameraConfig>,
        health: Arc<CameraHealthMonitor>,
        runtime: Arc<CameraRuntimeState>,
        pool: Arc<SwitcherConnectionPool>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(100);

        Self {
            show_id: show_id.into(),
            config,
            health,
            runtime,
            pool,
            inner: Mutex::new(Inner {
                cameras,
                records: HashMap::new(),
                last_switch: HashMap::new(),
            }),
            event_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FallbackEvent> {
        self.event_tx.subscribe()
    }

    pub fn config(&self) -> &FallbackConfig {
        &self.config
    }

    fn emit(&self, event: FallbackEvent) {
        let _ = self.event_tx.send(event);
    }

    /// React to a camera going down
    ///
    /// Applies the cooldown and chain-depth guards, then switches to the best
    /// available substitute or to standby.
    pub async fn handle_camera_failure(
        &self,
        camera_id: &str,
        current_segment: Option<&Segment>,
    ) -> FallbackResult<FallbackOutcome> {
        let mut inner = self.inner.lock().await;

        if inner.camera(camera_id).is_none() {
            return Err(FallbackError::UnknownCamera {
                camera_id: camera_id.to_string(),
            });
        }

        if let Some(last) = inner.last_switch.get(camera_id) {
            let elapsed = last.elapsed();
            if elapsed < self.config.cooldown {
                let remaining_ms = duration_ms(self.config.cooldown - elapsed);
                tracing::debug!(camera_id = %camera_id, remaining_ms, "Fallback cooldown active");
                return Err(FallbackError::CooldownActive {
                    camera_id: camera_id.to_string(),
                    remaining_ms,
                });
            }
        }

        let segment_id = current_segment.map(|s| s.id.clone());
        let depth = inner.depth_for(camera_id);

        if depth > self.config.max_fallback_depth {
            tracing::warn!(
                show_id = %self.show_id,
                camera_id = %camera_id,
                depth,
                max_depth = self.config.max_fallback_depth,
                "Fallback chain exhausted, switching to standby"
            );
            self.emit(FallbackEvent::ChainExhausted {
                camera_id: camera_id.to_string(),
                depth,
                max_depth: self.config.max_fallback_depth,
            });
            let scene = self
                .activate(
                    &mut inner,
                    camera_id,
                    FallbackTarget::Standby,
                    "fallback chain exhausted",
                    depth,
                    segment_id,
                )
                .await;
            return Ok(FallbackOutcome::Standby {
                scene,
                reason: StandbyReason::ChainExhausted,
            });
        }

        match self.select(&inner, camera_id).await {
            Some(fallback_id) => {
                let scene = self
                    .activate(
                        &mut inner,
                        camera_id,
                        FallbackTarget::Camera(fallback_id.clone()),
                        "camera failure",
                        depth,
                        segment_id,
                    )
                    .await;
                Ok(FallbackOutcome::Activated {
                    fallback_camera_id: fallback_id,
                    scene,
                })
            }
            None => {
                tracing::warn!(
                    show_id = %self.show_id,
                    camera_id = %camera_id,
                    standby_scene = %self.config.standby_scene,
                    "No healthy fallback camera, switching to standby"
                );
                self.emit(FallbackEvent::Unavailable {
                    camera_id: camera_id.to_string(),
                    standby_scene: self.config.standby_scene.clone(),
                });
                let scene = self
                    .activate(
                        &mut inner,
                        camera_id,
                        FallbackTarget::Standby,
                        "no healthy camera",
                        depth,
                        segment_id,
                    )
                    .await;
                Ok(FallbackOutcome::Standby {
                    scene,
                    reason: StandbyReason::NoHealthyCamera,
                })
            }
        }
    }

    /// Best healthy substitute for `camera_id`, if any
    pub async fn find_best_fallback(&self, camera_id: &str) -> Option<String> {
        let inner = self.inner.lock().await;
        self.select(&inner, camera_id).await
    }

    async fn select(&self, inner: &Inner, camera_id: &str) -> Option<String> {
        let failed = inner.camera(camera_id)?;
        let chain = inner.chain(camera_id);

        let mut candidates = Vec::new();
        for camera in &inner.cameras {
            if !chain.contains(&camera.id) && self.health.is_healthy(&camera.id).await {
                candidates.push(camera.id.clone());
            }
        }
        if candidates.is_empty() {
            return None;
        }

        // 1. Explicitly configured fallback
        if let Some(configured) = &failed.fallback_camera_id {
            if candidates.contains(configured) {
                return Some(configured.clone());
            }
        }

        // 2. Currently covering what the failed camera was meant to cover
        for candidate in &candidates {
            if let Some(state) = self.runtime.get_state(candidate).await {
                if failed
                    .expected_apparatus
                    .iter()
                    .any(|code| state.covers(code))
                {
                    return Some(candidate.clone());
                }
            }
        }

        // 3. Producer verified
        for candidate in &candidates {
            if self.runtime.is_verified(candidate).await {
                return Some(candidate.clone());
            }
        }

        // 4. Anything healthy
        candidates.into_iter().next()
    }

    /// Put `fallback_id` on air in place of `original_id`
    ///
    /// Skips the cooldown guard; used for operator-directed substitutions.
    pub async fn switch_to_fallback(
        &self,
        original_id: &str,
        fallback_id: &str,
        reason: &str,
    ) -> FallbackResult<FallbackOutcome> {
        if original_id == fallback_id {
            return Err(FallbackError::SelfFallback {
                camera_id: original_id.to_string(),
            });
        }

        let mut inner = self.inner.lock().await;
        for id in [original_id, fallback_id] {
            if inner.camera(id).is_none() {
                return Err(FallbackError::UnknownCamera {
                    camera_id: id.to_string(),
                });
            }
        }

        let depth = inner.depth_for(original_id);
        let scene = self
            .activate(
                &mut inner,
                original_id,
                FallbackTarget::Camera(fallback_id.to_string()),
                reason,
                depth,
                None,
            )
            .await;
        Ok(FallbackOutcome::Activated {
            fallback_camera_id: fallback_id.to_string(),
            scene,
        })
    }

    /// Record the substitution, issue the scene switch, then announce it
    ///
    /// A failed switch is reported but the record is kept. Returns the scene.
    async fn activate(
        &self,
        inner: &mut Inner,
        original_id: &str,
        target: FallbackTarget,
        reason: &str,
        depth: u32,
        segment_id: Option<String>,
    ) -> String {
        let scene = match &target {
            FallbackTarget::Camera(id) => inner
                .camera(id)
                .map(CameraConfig::single_scene)
                .unwrap_or_else(|| self.config.standby_scene.clone()),
            FallbackTarget::Standby => self.config.standby_scene.clone(),
        };

        let record = FallbackRecord {
            original_camera_id: original_id.to_string(),
            target: target.clone(),
            reason: reason.to_string(),
            activated_at: Utc::now(),
            depth,
            scene: scene.clone(),
            segment_id,
        };
        inner.records.insert(original_id.to_string(), record);
        inner
            .last_switch
            .insert(original_id.to_string(), Instant::now());

        let kind = match &target {
            FallbackTarget::Camera(_) => "camera",
            FallbackTarget::Standby => "standby",
        };
        metrics::inc_fallback_activations(&self.show_id, kind);

        tracing::warn!(
            show_id = %self.show_id,
            camera_id = %original_id,
            target = ?target,
            scene = %scene,
            depth,
            reason = %reason,
            "Fallback activated"
        );
        self.issue_scene(original_id, &scene).await;
        self.emit(FallbackEvent::Activated {
            original_camera_id: original_id.to_string(),
            target,
            scene: scene.clone(),
            reason: reason.to_string(),
            depth,
        });
        scene
    }

    async fn issue_scene(&self, camera_id: &str, scene: &str) -> bool {
        let result = match self.pool.require_connection(&self.show_id).await {
            Ok(connection) => connection.set_scene(scene).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    show_id = %self.show_id,
                    camera_id = %camera_id,
                    scene = %scene,
                    error = %e,
                    "Fallback scene switch failed"
                );
                metrics::inc_command_failures(&self.show_id, "set_scene");
                self.emit(FallbackEvent::CommandFailed {
                    camera_id: camera_id.to_string(),
                    scene: scene.to_string(),
                    error: e.to_string(),
                });
                false
            }
        }
    }

    /// Drop a camera's fallback, optionally putting its own scene back
    pub async fn clear_fallback(&self, camera_id: &str, switch_back: bool) -> Option<FallbackRecord> {
        let mut inner = self.inner.lock().await;
        let record = inner.records.remove(camera_id)?;

        let own_scene = inner.camera(camera_id).map(CameraConfig::single_scene);
        let switched_back = match (switch_back, own_scene) {
            (true, Some(scene)) => self.issue_scene(camera_id, &scene).await,
            _ => false,
        };

        tracing::info!(
            show_id = %self.show_id,
            camera_id = %camera_id,
            switched_back,
            "Fallback cleared"
        );
        self.emit(FallbackEvent::Cleared {
            camera_id: camera_id.to_string(),
            switched_back,
        });

        Some(record)
    }

    /// Drop every fallback and cooldown without touching the switcher
    pub async fn clear_all_fallbacks(&self) -> usize {
        let cleared: Vec<String> = {
            let mut inner = self.inner.lock().await;
            inner.last_switch.clear();
            inner.records.drain().map(|(id, _)| id).collect()
        };

        for camera_id in &cleared {
            self.emit(FallbackEvent::Cleared {
                camera_id: camera_id.clone(),
                switched_back: false,
            });
        }
        if !cleared.is_empty() {
            tracing::info!(show_id = %self.show_id, count = cleared.len(), "All fallbacks cleared");
        }
        cleared.len()
    }

    /// Active records, oldest first
    pub async fn active_fallbacks(&self) -> Vec<FallbackRecord> {
        let inner = self.inner.lock().await;
        let mut records: Vec<_> = inner.records.values().cloned().collect();
        records.sort_by_key(|r| r.activated_at);
        records
    }

    pub async fn get_fallback(&self, camera_id: &str) -> Option<FallbackRecord> {
        self.inner.lock().await.records.get(camera_id).cloned()
    }

    /// Swap the camera list, dropping records for removed cameras
    pub async fn update_config(&self, cameras: Vec<CameraConfig>) {
        let mut inner = self.inner.lock().await;
        inner
            .records
            .retain(|id, _| cameras.iter().any(|c| &c.id == id));
        inner
            .last_switch
            .retain(|id, _| cameras.iter().any(|c| &c.id == id));
        inner.cameras = cameras;
    }
}
