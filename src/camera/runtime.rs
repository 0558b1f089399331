//! Runtime apparatus coverage per camera
//!
//! Configuration says which apparatus a camera is expected to cover; during a
//! show operators re-point cameras. This keeps both views side by side along
//! with the producer's verification that a camera shows what it claims to.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

use super::error::{CameraError, CameraResult};
use crate::models::{same_apparatus, CameraConfig};

/// Expected vs current coverage for one camera
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuntimeApparatusState {
    pub camera_id: String,
    pub expected_apparatus: Vec<String>,
    pub current_apparatus: Vec<String>,
    pub verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
    pub verified_by: Option<String>,
}

impl RuntimeApparatusState {
    fn from_config(camera: &CameraConfig) -> Self {
        Self {
            camera_id: camera.id.clone(),
            expected_apparatus: camera.expected_apparatus.clone(),
            current_apparatus: camera.expected_apparatus.clone(),
            verified: false,
            verified_at: None,
            verified_by: None,
        }
    }

    /// Whether current coverage differs from the configured expectation
    pub fn is_mismatched(&self) -> bool {
        !same_apparatus(&self.expected_apparatus, &self.current_apparatus)
    }

    pub fn covers(&self, code: &str) -> bool {
        self.current_apparatus.iter().any(|a| a == code)
    }

    fn clear_verification(&mut self) {
        self.verified = false;
        self.verified_at = None;
        self.verified_by = None;
    }
}

/// Notifications published on runtime state changes
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeStateEvent {
    ApparatusReassigned {
        camera_id: String,
        previous: Vec<String>,
        current: Vec<String>,
        actor: String,
    },
    MismatchDetected {
        camera_id: String,
        expected: Vec<String>,
        current: Vec<String>,
    },
    CameraVerified {
        camera_id: String,
        actor: String,
    },
    CameraUnverified {
        camera_id: String,
    },
    VerificationsReset {
        count: usize,
    },
}

#[derive(Default)]
struct Inner {
    /// Camera ids in configuration order
    order: Vec<String>,
    states: HashMap<String, RuntimeApparatusState>,
}

impl Inner {
    fn state_mut(&mut self, camera_id: &str) -> CameraResult<&mut RuntimeApparatusState> {
        self.states
            .get_mut(camera_id)
            .ok_or_else(|| CameraError::unknown_camera(camera_id))
    }

    fn ordered(&self) -> impl Iterator<Item = &RuntimeApparatusState> {
        self.order.iter().filter_map(|id| self.states.get(id))
    }
}

/// Tracks what each camera is actually covering right now
pub struct CameraRuntimeState {
    inner: RwLock<Inner>,
    event_tx: broadcast::Sender<RuntimeStateEvent>,
}

impl CameraRuntimeState {
    pub fn new(cameras: &[CameraConfig]) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        let inner = Inner {
            order: cameras.iter().map(|c| c.id.clone()).collect(),
            states: cameras
                .iter()
                .map(|c| (c.id.clone(), RuntimeApparatusState::from_config(c)))
                .collect(),
        };

        Self {
            inner: RwLock::new(inner),
            event_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RuntimeStateEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: RuntimeStateEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Point a camera at a new set of apparatus
    ///
    /// Always clears verification. Emits a mismatch when the new set differs
    /// (ignoring order) from the configured expectation.
    pub async fn reassign_apparatus(
        &self,
        camera_id: &str,
        apparatus: Vec<String>,
        actor: &str,
    ) -> CameraResult<RuntimeApparatusState> {
        let (previous, state) = {
            let mut inner = self.inner.write().await;
            let state = inner.state_mut(camera_id)?;
            let previous = std::mem::replace(&mut state.current_apparatus, apparatus);
            state.clear_verification();
            (previous, state.clone())
        };

        tracing::info!(
            camera_id = %camera_id,
            actor = %actor,
            apparatus = ?state.current_apparatus,
            "Camera apparatus reassigned"
        );
        self.emit(RuntimeStateEvent::ApparatusReassigned {
            camera_id: camera_id.to_string(),
            previous,
            current: state.current_apparatus.clone(),
            actor: actor.to_string(),
        });

        if state.is_mismatched() {
            tracing::warn!(
                camera_id = %camera_id,
                expected = ?state.expected_apparatus,
                current = ?state.current_apparatus,
                "Camera apparatus mismatch"
            );
            self.emit(RuntimeStateEvent::MismatchDetected {
                camera_id: camera_id.to_string(),
                expected: state.expected_apparatus.clone(),
                current: state.current_apparatus.clone(),
            });
        }

        Ok(state)
    }

    /// Put a camera back on its configured apparatus
    pub async fn reset_to_expected(
        &self,
        camera_id: &str,
        actor: &str,
    ) -> CameraResult<RuntimeApparatusState> {
        let expected = {
            let inner = self.inner.read().await;
            inner
                .states
                .get(camera_id)
                .map(|s| s.expected_apparatus.clone())
                .ok_or_else(|| CameraError::unknown_camera(camera_id))?
        };
        self.reassign_apparatus(camera_id, expected, actor).await
    }

    /// Mark a camera as confirmed by a producer
    pub async fn verify_camera(
        &self,
        camera_id: &str,
        actor: &str,
    ) -> CameraResult<RuntimeApparatusState> {
        let state = {
            let mut inner = self.inner.write().await;
            let state = inner.state_mut(camera_id)?;
            state.verified = true;
            state.verified_at = Some(Utc::now());
            state.verified_by = Some(actor.to_string());
            state.clone()
        };

        tracing::info!(camera_id = %camera_id, actor = %actor, "Camera verified");
        self.emit(RuntimeStateEvent::CameraVerified {
            camera_id: camera_id.to_string(),
            actor: actor.to_string(),
        });
        Ok(state)
    }

    pub async fn unverify_camera(&self, camera_id: &str) -> CameraResult<RuntimeApparatusState> {
        let (was_verified, state) = {
            let mut inner = self.inner.write().await;
            let state = inner.state_mut(camera_id)?;
            let was_verified = state.verified;
            state.clear_verification();
            (was_verified, state.clone())
        };

        if was_verified {
            tracing::info!(camera_id = %camera_id, "Camera verification cleared");
            self.emit(RuntimeStateEvent::CameraUnverified {
                camera_id: camera_id.to_string(),
            });
        }
        Ok(state)
    }

    /// Clear every verification flag, returning how many were set
    pub async fn reset_all_verifications(&self) -> usize {
        let mut count = 0;
        {
            let mut inner = self.inner.write().await;
            for state in inner.states.values_mut().filter(|s| s.verified) {
                state.clear_verification();
                count += 1;
            }
        }

        tracing::info!(count, "Camera verifications reset");
        self.emit(RuntimeStateEvent::VerificationsReset { count });
        count
    }

    /// Cameras whose coverage differs from their expectation
    pub async fn get_mismatches(&self) -> Vec<RuntimeApparatusState> {
        let inner = self.inner.read().await;
        let mismatches = inner.ordered().filter(|s| s.is_mismatched()).cloned().collect();
        mismatches
    }

    /// First camera (in configuration order) currently covering `code`
    pub async fn get_camera_for_apparatus(&self, code: &str) -> Option<String> {
        let inner = self.inner.read().await;
        let camera_id = inner
            .ordered()
            .find(|s| s.covers(code))
            .map(|s| s.camera_id.clone());
        camera_id
    }

    pub async fn get_state(&self, camera_id: &str) -> Option<RuntimeApparatusState> {
        self.inner.read().await.states.get(camera_id).cloned()
    }

    pub async fn get_all_states(&self) -> Vec<RuntimeApparatusState> {
        let inner = self.inner.read().await;
        let states = inner.ordered().cloned().collect();
        states
    }

    pub async fn is_verified(&self, camera_id: &str) -> bool {
        self.inner
            .read()
            .await
            .states
            .get(camera_id)
            .is_some_and(|s| s.verified)
    }

    /// Swap the camera list
    ///
    /// Surviving cameras keep their current coverage and verification; only
    /// their expectation is refreshed. New cameras start on their expectation.
    pub async fn update_config(&self, cameras: &[CameraConfig]) {
        let mut inner = self.inner.write().await;

        let mut states = HashMap::with_capacity(cameras.len());
        for camera in cameras {
            let state = match inner.states.remove(&camera.id) {
                Some(mut existing) => {
                    existing.expected_apparatus = camera.expected_apparatus.clone();
                    existing
                }
                None => RuntimeApparatusState::from_config(camera),
            };
            states.insert(camera.id.clone(), state);
        }

        inner.order = cameras.iter().map(|c| c.id.clone()).collect();
        inner.states = states;

        tracing::info!(cameras = cameras.len(), "Camera runtime configuration updated");
    }
}
