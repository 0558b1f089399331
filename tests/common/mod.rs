//! Common test utilities

#![allow(dead_code)]

use async_trait::async_trait;
use showrunner::camera::{CameraError, CameraResult, StatsSource, StreamStats};
use showrunner::config::ShowConfig;
use showrunner::models::{CameraConfig, Segment, SegmentType};
use showrunner::scheduler::ScheduleEvent;
use showrunner::switcher::{MemoryConnector, PoolConfig, SwitcherConnectionPool};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// Stats source replaying whatever the test set last
#[derive(Default)]
pub struct ScriptedStats {
    batch: Mutex<Option<Vec<StreamStats>>>,
}

impl ScriptedStats {
    pub fn set(&self, batch: Vec<StreamStats>) {
        *self.batch.lock().unwrap() = Some(batch);
    }

    pub fn fail(&self) {
        *self.batch.lock().unwrap() = None;
    }
}

#[async_trait]
impl StatsSource for ScriptedStats {
    async fn fetch(&self) -> CameraResult<Vec<StreamStats>> {
        self.batch
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| CameraError::stats_fetch("scripted", "unreachable"))
    }
}

/// A healthy stream record
pub fn clean(key: &str) -> StreamStats {
    StreamStats::new(key).with_bitrate(4000.0).with_loss(0.0)
}

/// Three-segment gymnastics-style show with two cameras
///
/// - `intro`: 10s live, auto-advance, scene "Wide"
/// - `vault`: 20s live, auto-advance, scene "Vault"
/// - `break`: break with no duration, scene "Standby"
pub fn create_test_show(id: &str) -> ShowConfig {
    ShowConfig::new(id)
        .with_segments(vec![
            Segment::new("intro", "Intro", SegmentType::Live)
                .with_duration(10)
                .with_scene("Wide"),
            Segment::new("vault", "Vault Rotation", SegmentType::Live)
                .with_duration(20)
                .with_scene("Vault"),
            Segment::new("break", "Break", SegmentType::Break).with_scene("Standby"),
        ])
        .with_cameras(vec![
            CameraConfig::new("cam-vt", "Vault Cam", "9001")
                .with_apparatus(["VT"])
                .with_fallback("cam-wide"),
            CameraConfig::new("cam-wide", "Wide Cam", "9002").with_apparatus(["VT", "FX"]),
        ])
}

/// Connection pool backed by an in-memory switcher
pub fn memory_pool() -> (MemoryConnector, Arc<SwitcherConnectionPool>) {
    let connector = MemoryConnector::new();
    let pool = SwitcherConnectionPool::new(PoolConfig::default(), Arc::new(connector.clone()));
    (connector, pool)
}

/// Names of every event queued on `rx`, ticks excluded
pub fn drain_names(rx: &mut broadcast::Receiver<ScheduleEvent>) -> Vec<&'static str> {
    let mut names = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if !matches!(event, ScheduleEvent::Tick { .. }) {
            names.push(event.name());
        }
    }
    names
}

/// Let spawned tasks run
pub async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
}
