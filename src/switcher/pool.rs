//! One reconnecting switcher connection per show
//!
//! The pool owns every [`SwitcherConnection`]. A failed connect, or a session
//! that closes underneath us, schedules exactly one reconnect attempt after
//! the configured delay; attempts repeat until they succeed or the show is
//! disconnected.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;

use super::client::{ClientEvent, SwitcherConnector};
use super::connection::SwitcherConnection;
use super::error::{SwitcherError, SwitcherResult};
use crate::metrics;
use crate::utils::{duration_ms, DelayedTask};

/// Pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Fixed delay before every reconnect attempt
    pub reconnect_delay: Duration,

    /// Capacity of the [`PoolEvent`] broadcast channel
    pub event_channel_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(30),
            event_channel_capacity: 100,
        }
    }
}

/// Connection state for one show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connected,
    Disconnected,
    Reconnecting,
}

/// Snapshot of a show's connection
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub show_id: String,
    pub address: String,
    pub state: ConnectionState,
    pub connected_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub reconnect_attempts: u32,
}

/// Notifications published by the pool
#[derive(Debug, Clone, PartialEq)]
pub enum PoolEvent {
    Connected {
        show_id: String,
        address: String,
    },
    Disconnected {
        show_id: String,
    },
    /// The remote side closed an established session
    ConnectionClosed {
        show_id: String,
        reason: String,
    },
    ConnectionFailed {
        show_id: String,
        address: String,
        error: String,
    },
    ReconnectScheduled {
        show_id: String,
        delay_ms: u64,
        attempt: u32,
    },
    SwitcherNotice {
        show_id: String,
        message: String,
    },
}

struct PoolEntry {
    address: String,
    state: ConnectionState,
    connection: Option<Arc<SwitcherConnection>>,
    connected_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    reconnect_attempts: u32,
    reconnect: Option<DelayedTask>,
    forwarder: Option<JoinHandle<()>>,
    /// Bumped on every successful connect so a stale forwarder can't tear
    /// down a newer session
    generation: u64,
    /// Bumped when a connect attempt starts; only the latest may install
    attempt: u64,
}

impl PoolEntry {
    fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            state: ConnectionState::Disconnected,
            connection: None,
            connected_at: None,
            last_error: None,
            reconnect_attempts: 0,
            reconnect: None,
            forwarder: None,
            generation: 0,
            attempt: 0,
        }
    }

    fn begin_attempt(&mut self) -> u64 {
        self.attempt += 1;
        self.attempt
    }

    fn has_pending_reconnect(&self) -> bool {
        self.reconnect.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn info(&self, show_id: &str) -> ConnectionInfo {
        ConnectionInfo {
            show_id: show_id.to_string(),
            address: self.address.clone(),
            state: self.state,
            connected_at: self.connected_at,
            last_error: self.last_error.clone(),
            reconnect_attempts: self.reconnect_attempts,
        }
    }

    /// Stop timers and the event forwarder, handing back the live connection
    fn teardown(&mut self) -> Option<Arc<SwitcherConnection>> {
        if let Some(task) = self.reconnect.take() {
            task.cancel();
        }
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        self.state = ConnectionState::Disconnected;
        self.connection.take()
    }
}

/// Switcher connections keyed by show id
pub struct SwitcherConnectionPool {
    config: PoolConfig,
    connector: Arc<dyn SwitcherConnector>,
    entries: Mutex<HashMap<String, PoolEntry>>,
    event_tx: broadcast::Sender<PoolEvent>,
    self_ref: Weak<SwitcherConnectionPool>,
}

impl SwitcherConnectionPool {
    pub fn new(config: PoolConfig, connector: Arc<dyn SwitcherConnector>) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity.max(1));

        Arc::new_cyclic(|self_ref| Self {
            config,
            connector,
            entries: Mutex::new(HashMap::new()),
            event_tx,
            self_ref: self_ref.clone(),
        })
    }

    /// Subscribe to pool events
    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: PoolEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Connect a show to a switcher
    ///
    /// An already connected show gets its existing connection back without a
    /// second attempt. Connecting to a different address replaces the old
    /// session. On failure a reconnect is scheduled and the error returned.
    pub async fn connect(
        &self,
        show_id: &str,
        address: &str,
    ) -> SwitcherResult<Arc<SwitcherConnection>> {
        let (token, replaced) = {
            let mut entries = self.entries.lock().await;
            let entry = entries
                .entry(show_id.to_string())
                .or_insert_with(|| PoolEntry::new(address));

            let mut replaced = None;
            if entry.address == address {
                if let (ConnectionState::Connected, Some(conn)) = (entry.state, &entry.connection)
                {
                    return Ok(conn.clone());
                }
            } else {
                tracing::info!(
                    show_id = %show_id,
                    old_address = %entry.address,
                    new_address = %address,
                    "Switcher address changed, replacing connection"
                );
                replaced = entry.teardown();
                entry.address = address.to_string();
            }
            (entry.begin_attempt(), replaced)
        };

        if let Some(old) = replaced {
            old.close().await;
        }
        self.attempt(show_id, address, token).await
    }

    /// Open a session without holding the entry lock, then install it
    ///
    /// The result is dropped if the show was disconnected or a newer attempt
    /// started while this one was in flight.
    async fn attempt(
        &self,
        show_id: &str,
        address: &str,
        token: u64,
    ) -> SwitcherResult<Arc<SwitcherConnection>> {
        let result = self.connector.connect(address).await;

        let mut entries = self.entries.lock().await;
        let Some(entry) = entries
            .get_mut(show_id)
            .filter(|e| e.attempt == token && e.address == address)
        else {
            drop(entries);
            tracing::debug!(
                show_id = %show_id,
                address = %address,
                "Discarding superseded switcher connect"
            );
            if let Ok(session) = result {
                session.client.close().await;
            }
            return Err(SwitcherError::connection_failed(
                address,
                "superseded by a newer attempt",
            ));
        };

        match result {
            Ok(session) => {
                let connection = Arc::new(SwitcherConnection::new(show_id, address, session.client));

                entry.generation += 1;
                if let Some(task) = entry.reconnect.take() {
                    task.cancel();
                }
                if let Some(old) = entry.forwarder.take() {
                    old.abort();
                }
                entry.forwarder = Some(self.spawn_forwarder(
                    show_id.to_string(),
                    entry.generation,
                    session.events,
                ));
                entry.state = ConnectionState::Connected;
                entry.connection = Some(connection.clone());
                entry.connected_at = Some(connection.connected_at());
                entry.last_error = None;
                entry.reconnect_attempts = 0;

                metrics::set_switcher_connected(show_id, true);
                tracing::info!(show_id = %show_id, address = %address, "Switcher connected");
                self.emit(PoolEvent::Connected {
                    show_id: show_id.to_string(),
                    address: address.to_string(),
                });

                Ok(connection)
            }
            Err(e) => {
                entry.connection = None;
                entry.last_error = Some(e.to_string());
                metrics::set_switcher_connected(show_id, false);

                tracing::warn!(
                    show_id = %show_id,
                    address = %address,
                    error = %e,
                    "Switcher connection failed"
                );
                self.emit(PoolEvent::ConnectionFailed {
                    show_id: show_id.to_string(),
                    address: address.to_string(),
                    error: e.to_string(),
                });

                if e.is_recoverable() {
                    entry.state = ConnectionState::Reconnecting;
                    self.schedule_reconnect(show_id, entry);
                } else {
                    entry.state = ConnectionState::Disconnected;
                }

                Err(e)
            }
        }
    }

    fn schedule_reconnect(&self, show_id: &str, entry: &mut PoolEntry) {
        if entry.has_pending_reconnect() {
            return;
        }

        entry.reconnect_attempts += 1;
        let delay = self.config.reconnect_delay;
        let attempt = entry.reconnect_attempts;

        let pool = self.self_ref.clone();
        let target = show_id.to_string();
        entry.reconnect = Some(DelayedTask::spawn(delay, async move {
            if let Some(pool) = pool.upgrade() {
                pool.reconnect(&target).await;
            }
        }));

        metrics::inc_reconnect_attempts(show_id);
        tracing::info!(
            show_id = %show_id,
            delay_ms = duration_ms(delay),
            attempt,
            "Switcher reconnect scheduled"
        );
        self.emit(PoolEvent::ReconnectScheduled {
            show_id: show_id.to_string(),
            delay_ms: duration_ms(delay),
            attempt,
        });
    }

    async fn reconnect(&self, show_id: &str) {
        let (address, token) = {
            let mut entries = self.entries.lock().await;
            let Some(entry) = entries.get_mut(show_id) else {
                return;
            };
            // This is our own handle; it must not be aborted mid-attempt
            entry.reconnect.take();
            if entry.state == ConnectionState::Connected {
                return;
            }
            (entry.address.clone(), entry.begin_attempt())
        };

        tracing::debug!(show_id = %show_id, address = %address, "Attempting switcher reconnect");
        let _ = self.attempt(show_id, &address, token).await;
    }

    fn spawn_forwarder(
        &self,
        show_id: String,
        generation: u64,
        mut events: mpsc::Receiver<ClientEvent>,
    ) -> JoinHandle<()> {
        let pool = self.self_ref.clone();

        tokio::spawn(async move {
            let reason = loop {
                match events.recv().await {
                    Some(ClientEvent::Notice { message }) => {
                        let Some(pool) = pool.upgrade() else { return };
                        pool.emit(PoolEvent::SwitcherNotice {
                            show_id: show_id.clone(),
                            message,
                        });
                    }
                    Some(ClientEvent::Closed { reason }) => break reason,
                    None => break "session ended".to_string(),
                }
            };

            if let Some(pool) = pool.upgrade() {
                pool.handle_closed(&show_id, generation, reason).await;
            }
        })
    }

    async fn handle_closed(&self, show_id: &str, generation: u64, reason: String) {
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries.get_mut(show_id) else {
            return;
        };
        if entry.generation != generation || entry.state != ConnectionState::Connected {
            return;
        }

        entry.state = ConnectionState::Reconnecting;
        entry.connection = None;
        entry.forwarder = None;
        entry.last_error = Some(reason.clone());
        metrics::set_switcher_connected(show_id, false);

        tracing::warn!(show_id = %show_id, reason = %reason, "Switcher connection closed");
        self.emit(PoolEvent::ConnectionClosed {
            show_id: show_id.to_string(),
            reason,
        });

        self.schedule_reconnect(show_id, entry);
    }

    /// The live connection for a show, if connected
    pub async fn get_connection(&self, show_id: &str) -> Option<Arc<SwitcherConnection>> {
        let entries = self.entries.lock().await;
        entries
            .get(show_id)
            .filter(|e| e.state == ConnectionState::Connected)
            .and_then(|e| e.connection.clone())
    }

    /// Like [`get_connection`](Self::get_connection) but as an error
    pub async fn require_connection(&self, show_id: &str) -> SwitcherResult<Arc<SwitcherConnection>> {
        self.get_connection(show_id)
            .await
            .ok_or_else(|| SwitcherError::not_connected(show_id))
    }

    pub async fn is_connected(&self, show_id: &str) -> bool {
        self.get_connection(show_id).await.is_some()
    }

    /// Close a show's connection and cancel any pending reconnect
    ///
    /// Returns `false` if the pool knew nothing about the show.
    pub async fn disconnect(&self, show_id: &str) -> bool {
        let removed = self.entries.lock().await.remove(show_id);
        let Some(mut entry) = removed else {
            return false;
        };

        if let Some(connection) = entry.teardown() {
            connection.close().await;
        }
        metrics::set_switcher_connected(show_id, false);

        tracing::info!(show_id = %show_id, "Switcher disconnected");
        self.emit(PoolEvent::Disconnected {
            show_id: show_id.to_string(),
        });
        true
    }

    /// Disconnect every show
    pub async fn shutdown(&self) {
        let drained: Vec<(String, PoolEntry)> = self.entries.lock().await.drain().collect();

        for (show_id, mut entry) in drained {
            if let Some(connection) = entry.teardown() {
                connection.close().await;
            }
            metrics::set_switcher_connected(&show_id, false);
            self.emit(PoolEvent::Disconnected { show_id });
        }

        tracing::info!("Switcher pool shut down");
    }

    pub async fn connection_info(&self, show_id: &str) -> Option<ConnectionInfo> {
        let entries = self.entries.lock().await;
        entries.get(show_id).map(|e| e.info(show_id))
    }

    /// Snapshots of every known connection, ordered by show id
    pub async fn all_connections(&self) -> Vec<ConnectionInfo> {
        let entries = self.entries.lock().await;
        let mut infos: Vec<_> = entries.iter().map(|(id, e)| e.info(id)).collect();
        infos.sort_by(|a, b| a.show_id.cmp(&b.show_id));
        infos
    }
}
