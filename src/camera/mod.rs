//! Camera fault tolerance
//!
//! - [`health`] - classifies feeds from polled stream stats
//! - [`runtime`] - expected vs current apparatus coverage and verification
//! - [`fallback`] - substitutes a healthy camera (or standby) on failure
//! - [`stats`] - stats sources and field normalisation

pub mod error;
pub mod fallback;
pub mod health;
pub mod runtime;
pub mod stats;

pub use error::{CameraError, CameraResult, FallbackError, FallbackResult};
pub use fallback::{
    CameraFallbackManager, FallbackConfig, FallbackEvent, FallbackOutcome, FallbackRecord,
    FallbackTarget, StandbyReason,
};
pub use health::{
    CameraHealthMonitor, CameraHealthState, HealthEvent, HealthMonitorConfig,
    HealthMonitorConfigBuilder, HealthStatus,
};
pub use runtime::{CameraRuntimeState, RuntimeApparatusState, RuntimeStateEvent};
pub use stats::{HttpStatsSource, NoStatsSource, StatsSource, StreamStats};

#[cfg(test)]
pub(crate) mod testing {
    use super::error::{CameraError, CameraResult};
    use super::stats::{StatsSource, StreamStats};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Stats source returning whatever the test last set
    #[derive(Default)]
    pub struct ScriptedStats {
        batch: Mutex<Option<Vec<StreamStats>>>,
        fetches: AtomicUsize,
    }

    impl ScriptedStats {
        pub fn set(&self, batch: Vec<StreamStats>) {
            *self.batch.lock().unwrap() = Some(batch);
        }

        /// Make the next fetches fail
        pub fn fail(&self) {
            *self.batch.lock().unwrap() = None;
        }

        pub fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StatsSource for ScriptedStats {
        async fn fetch(&self) -> CameraResult<Vec<StreamStats>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.batch
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| CameraError::stats_fetch("test", "unreachable"))
        }
    }

    pub fn clean(key: &str) -> StreamStats {
        StreamStats::new(key).with_bitrate(4000.0).with_loss(0.5)
    }
}
