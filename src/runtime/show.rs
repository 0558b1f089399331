//! One show's components and the wiring between them

use serde::Serialize;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::camera::{
    CameraFallbackManager, CameraHealthMonitor, CameraRuntimeState, HealthEvent, HealthStatus,
    HttpStatsSource, NoStatsSource, StatsSource,
};
use crate::config::{AppConfig, ShowConfig};
use crate::error::{Error, Result};
use crate::scheduler::{
    GraphicsController, HttpGraphicsController, Lifecycle, SchedulerConfig, SegmentScheduler,
};
use crate::switcher::{ConnectionInfo, SwitcherConnectionPool};

/// Address used for shows without a switcher; served by the dry-run pool
pub const DRY_RUN_ADDRESS: &str = "memory://dry-run";

/// Short listing entry for a loaded show
#[derive(Debug, Clone, Serialize)]
pub struct ShowSummary {
    pub id: String,
    pub name: String,
    pub lifecycle: Lifecycle,
    pub current_segment_id: Option<String>,
    pub segment_count: usize,
    pub camera_count: usize,
    pub active_fallbacks: usize,
    pub dry_run: bool,
    pub switcher: Option<ConnectionInfo>,
}

/// Scheduler, camera services and switcher connection for one show
pub struct ShowRuntime {
    show_id: String,
    name: String,
    switcher_address: String,
    monitor_cameras: bool,
    scheduler: Arc<SegmentScheduler>,
    health: Arc<CameraHealthMonitor>,
    cameras: Arc<CameraRuntimeState>,
    fallback: Arc<CameraFallbackManager>,
    pool: Arc<SwitcherConnectionPool>,
    wiring: StdMutex<Option<JoinHandle<()>>>,
}

impl ShowRuntime {
    /// Build a show with HTTP collaborators taken from its config
    pub fn from_config(
        show: ShowConfig,
        settings: &AppConfig,
        pool: Arc<SwitcherConnectionPool>,
    ) -> Result<Arc<Self>> {
        let stats: Arc<dyn StatsSource> = match &show.stats_source {
            Some(source) => Arc::new(HttpStatsSource::from_endpoint(
                &source.host,
                source.port,
                source.path.as_deref(),
                settings.stats_request_timeout(),
            )?),
            None => Arc::new(NoStatsSource),
        };

        let graphics: Option<Arc<dyn GraphicsController>> = match &show.graphics {
            Some(graphics) => Some(Arc::new(HttpGraphicsController::new(
                &graphics.webhook_url,
                Duration::from_millis(graphics.timeout_ms),
            )?)),
            None => None,
        };

        Ok(Self::new(show, settings, pool, stats, graphics))
    }

    pub fn new(
        show: ShowConfig,
        settings: &AppConfig,
        pool: Arc<SwitcherConnectionPool>,
        stats: Arc<dyn StatsSource>,
        graphics: Option<Arc<dyn GraphicsController>>,
    ) -> Arc<Self> {
        let show_id = show.id.clone();
        let name = show.display_name().to_string();
        let switcher_address = show
            .switcher
            .as_ref()
            .map(|s| s.address.clone())
            .unwrap_or_else(|| DRY_RUN_ADDRESS.to_string());

        let health = CameraHealthMonitor::new(
            settings.health_monitor_config(show.stats_source.as_ref()),
            show.cameras.clone(),
            stats,
        );
        let cameras = Arc::new(CameraRuntimeState::new(&show.cameras));
        let fallback = Arc::new(CameraFallbackManager::new(
            &show_id,
            settings.fallback_config(show.standby_scene.as_deref()),
            show.cameras.clone(),
            health.clone(),
            cameras.clone(),
            pool.clone(),
        ));

        let scheduler_config = SchedulerConfig {
            tick_interval: settings.tick_interval(),
            rehearsal: settings.scheduler.rehearsal,
            ..SchedulerConfig::default()
        };
        let monitor_cameras = show.stats_source.is_some() && !show.cameras.is_empty();
        let scheduler = SegmentScheduler::new(show, scheduler_config, pool.clone(), graphics);

        Arc::new(Self {
            show_id,
            name,
            switcher_address,
            monitor_cameras,
            scheduler,
            health,
            cameras,
            fallback,
            pool,
            wiring: StdMutex::new(None),
        })
    }

    pub fn show_id(&self) -> &str {
        &self.show_id
    }

    pub fn switcher_address(&self) -> &str {
        &self.switcher_address
    }

    pub fn is_dry_run(&self) -> bool {
        self.switcher_address == DRY_RUN_ADDRESS
    }

    pub fn scheduler(&self) -> &Arc<SegmentScheduler> {
        &self.scheduler
    }

    pub fn health(&self) -> &Arc<CameraHealthMonitor> {
        &self.health
    }

    pub fn cameras(&self) -> &Arc<CameraRuntimeState> {
        &self.cameras
    }

    pub fn fallback(&self) -> &Arc<CameraFallbackManager> {
        &self.fallback
    }

    /// Connect the switcher, start camera monitoring and wire health into fallback
    ///
    /// A failed switcher connection is not an error here: the pool keeps
    /// retrying in the background.
    pub async fn activate(&self) {
        if let Err(e) = self.pool.connect(&self.show_id, &self.switcher_address).await {
            tracing::warn!(
                show_id = %self.show_id,
                address = %self.switcher_address,
                error = %e,
                "Switcher unavailable, retrying in background"
            );
        }

        if self.monitor_cameras {
            self.health.start().await;
        }

        if let Ok(mut wiring) = self.wiring.lock() {
            if wiring.is_none() {
                *wiring = Some(self.spawn_wiring());
            }
        }

        tracing::info!(
            show_id = %self.show_id,
            dry_run = self.is_dry_run(),
            monitor_cameras = self.monitor_cameras,
            "Show activated"
        );
    }

    /// Start the run-of-show from a clean fallback slate
    pub async fn start_show(&self) -> Result<()> {
        self.fallback.clear_all_fallbacks().await;
        self.scheduler.start().await?;
        Ok(())
    }

    /// Stop everything this show owns and release its switcher connection
    pub async fn shutdown(&self) {
        if let Err(e) = self.scheduler.stop("system").await {
            tracing::warn!(show_id = %self.show_id, error = %e, "Scheduler stop failed");
        }
        self.health.stop().await;
        self.abort_wiring();
        self.fallback.clear_all_fallbacks().await;
        self.pool.disconnect(&self.show_id).await;

        tracing::info!(show_id = %self.show_id, "Show shut down");
    }

    /// Hot-swap the show's configuration
    pub async fn update_config(&self, show: ShowConfig) -> Result<()> {
        show.validate()?;
        if show.id != self.show_id {
            return Err(Error::Config(crate::config::ConfigError::invalid(
                "id",
                format!("expected show id '{}', got '{}'", self.show_id, show.id),
            )));
        }

        let cameras = show.cameras.clone();
        self.scheduler.update_config(show).await?;
        self.health.update_config(cameras.clone()).await;
        self.cameras.update_config(&cameras).await;
        self.fallback.update_config(cameras).await;
        Ok(())
    }

    pub async fn summary(&self) -> ShowSummary {
        let state = self.scheduler.get_state().await;
        let camera_count = self.cameras.get_all_states().await.len();

        ShowSummary {
            id: self.show_id.clone(),
            name: self.name.clone(),
            lifecycle: state.lifecycle,
            current_segment_id: state.current_segment.map(|s| s.id),
            segment_count: state.segment_count,
            camera_count,
            active_fallbacks: self.fallback.active_fallbacks().await.len(),
            dry_run: self.is_dry_run(),
            switcher: self.pool.connection_info(&self.show_id).await,
        }
    }

    fn spawn_wiring(&self) -> JoinHandle<()> {
        let mut events = self.health.subscribe();
        let scheduler = self.scheduler.clone();
        let fallback = self.fallback.clone();
        let show_id = self.show_id.clone();

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(HealthEvent::StatusChanged {
                        camera_id, current, ..
                    }) => {
                        on_status_change(&show_id, &scheduler, &fallback, &camera_id, current)
                            .await;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(show_id = %show_id, skipped, "Health events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    fn abort_wiring(&self) {
        if let Ok(mut wiring) = self.wiring.lock() {
            if let Some(handle) = wiring.take() {
                handle.abort();
            }
        }
    }
}

impl Drop for ShowRuntime {
    fn drop(&mut self) {
        self.abort_wiring();
    }
}

async fn on_status_change(
    show_id: &str,
    scheduler: &SegmentScheduler,
    fallback: &CameraFallbackManager,
    camera_id: &str,
    current: HealthStatus,
) {
    if current.is_failure() {
        // Runs even with an active record so a failed switch gets re-asserted
        let segment = scheduler.get_state().await.current_segment;
        match fallback.handle_camera_failure(camera_id, segment.as_ref()).await {
            Ok(outcome) => {
                tracing::info!(show_id, camera_id, ?outcome, "Camera failure handled");
            }
            Err(e) if e.is_recoverable() => {
                tracing::debug!(show_id, camera_id, error = %e, "Fallback deferred");
            }
            Err(e) => {
                tracing::warn!(show_id, camera_id, error = %e, "Fallback rejected");
            }
        }
    } else if current == HealthStatus::Healthy && fallback.get_fallback(camera_id).await.is_some()
    {
        let switch_back = fallback.config().restore_on_recovery;
        fallback.clear_fallback(camera_id, switch_back).await;
    }
}
