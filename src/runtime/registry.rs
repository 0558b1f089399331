//! Loaded shows, keyed by id

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::show::{ShowRuntime, ShowSummary};
use crate::config::{AppConfig, ShowConfig};
use crate::error::{Error, Result};
use crate::switcher::{HttpSwitcherConnector, MemoryConnector, SwitcherConnectionPool};

/// All shows this process runs
///
/// Shows with a switcher address share the HTTP pool. Shows without one run
/// against an in-memory switcher so their schedule still plays out.
pub struct ShowRegistry {
    settings: AppConfig,
    pool: Arc<SwitcherConnectionPool>,
    dry_run_pool: Arc<SwitcherConnectionPool>,
    shows: RwLock<HashMap<String, Arc<ShowRuntime>>>,
}

impl ShowRegistry {
    /// Registry talking to real switchers over HTTP
    pub fn new(settings: AppConfig) -> Result<Self> {
        let connector = HttpSwitcherConnector::new(settings.http_switcher_config())?;
        let pool = SwitcherConnectionPool::new(settings.pool_config(), Arc::new(connector));
        Ok(Self::with_pool(settings, pool))
    }

    pub fn with_pool(settings: AppConfig, pool: Arc<SwitcherConnectionPool>) -> Self {
        let dry_run_pool =
            SwitcherConnectionPool::new(settings.pool_config(), Arc::new(MemoryConnector::new()));

        Self {
            settings,
            pool,
            dry_run_pool,
            shows: RwLock::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &AppConfig {
        &self.settings
    }

    pub fn pool(&self) -> &Arc<SwitcherConnectionPool> {
        &self.pool
    }

    /// Build and activate a show, replacing any show with the same id
    pub async fn load(&self, show: ShowConfig) -> Result<Arc<ShowRuntime>> {
        show.validate()?;

        let pool = if show.switcher.is_some() {
            self.pool.clone()
        } else {
            self.dry_run_pool.clone()
        };
        let runtime = ShowRuntime::from_config(show, &self.settings, pool)?;

        let replaced = self
            .shows
            .write()
            .await
            .insert(runtime.show_id().to_string(), runtime.clone());
        if let Some(old) = replaced {
            tracing::info!(show_id = %old.show_id(), "Replacing loaded show");
            old.shutdown().await;
        }

        runtime.activate().await;
        Ok(runtime)
    }

    pub async fn get(&self, show_id: &str) -> Result<Arc<ShowRuntime>> {
        self.shows
            .read()
            .await
            .get(show_id)
            .cloned()
            .ok_or_else(|| Error::show_not_found(show_id))
    }

    pub async fn list(&self) -> Vec<ShowSummary> {
        let shows: Vec<Arc<ShowRuntime>> = self.shows.read().await.values().cloned().collect();

        let mut summaries = join_all(shows.iter().map(|show| show.summary())).await;
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }

    /// Unload a show, stopping it first
    pub async fn remove(&self, show_id: &str) -> Result<()> {
        let removed = self.shows.write().await.remove(show_id);
        match removed {
            Some(show) => {
                show.shutdown().await;
                Ok(())
            }
            None => Err(Error::show_not_found(show_id)),
        }
    }

    pub async fn shutdown(&self) {
        let shows: Vec<Arc<ShowRuntime>> =
            self.shows.write().await.drain().map(|(_, s)| s).collect();

        join_all(shows.iter().map(|show| show.shutdown())).await;
        self.pool.shutdown().await;
        self.dry_run_pool.shutdown().await;
    }
}
