//! In-process switcher that records commands instead of sending them
//!
//! Used for dry runs when no switcher address is configured, and as the
//! switcher double in tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use super::client::{ClientEvent, ClientSession, SwitcherClient, SwitcherConnector};
use super::command::SwitcherCommand;
use super::error::{SwitcherError, SwitcherResult};

/// Commands kept by default; older ones are dropped first
pub const DEFAULT_LOG_LIMIT: usize = 1000;

#[derive(Default)]
struct Shared {
    commands: Mutex<VecDeque<(String, SwitcherCommand)>>,
    log_limit: usize,
    sessions: Mutex<Vec<mpsc::Sender<ClientEvent>>>,
    connect_attempts: AtomicUsize,
    unreachable: AtomicBool,
    fail_commands: AtomicBool,
}

/// Connector handing out [`MemorySwitcher`] sessions that share one log
#[derive(Clone)]
pub struct MemoryConnector {
    shared: Arc<Shared>,
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::with_log_limit(DEFAULT_LOG_LIMIT)
    }
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `limit` commands in the log
    pub fn with_log_limit(limit: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                log_limit: limit,
                ..Shared::default()
            }),
        }
    }

    /// Make subsequent connect attempts fail (or succeed again)
    pub fn set_reachable(&self, reachable: bool) {
        self.shared.unreachable.store(!reachable, Ordering::SeqCst);
    }

    /// Make every command fail (or succeed again)
    pub fn set_fail_commands(&self, fail: bool) {
        self.shared.fail_commands.store(fail, Ordering::SeqCst);
    }

    pub fn connect_attempts(&self) -> usize {
        self.shared.connect_attempts.load(Ordering::SeqCst)
    }

    /// Every command received, with the address of the session it came through
    pub fn commands(&self) -> Vec<(String, SwitcherCommand)> {
        self.shared
            .commands
            .lock()
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Scenes put on program, in order
    pub fn scenes(&self) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter_map(|(_, cmd)| match cmd {
                SwitcherCommand::SetScene { scene } => Some(scene),
                _ => None,
            })
            .collect()
    }

    pub fn clear_commands(&self) {
        if let Ok(mut log) = self.shared.commands.lock() {
            log.clear();
        }
    }

    /// Simulate the remote side closing every open session
    pub async fn close_sessions(&self, reason: &str) {
        let senders: Vec<_> = self
            .shared
            .sessions
            .lock()
            .map(|mut s| s.drain(..).collect())
            .unwrap_or_default();

        for sender in senders {
            let _ = sender
                .send(ClientEvent::Closed {
                    reason: reason.to_string(),
                })
                .await;
        }
    }
}

#[async_trait]
impl SwitcherConnector for MemoryConnector {
    async fn connect(&self, address: &str) -> SwitcherResult<ClientSession> {
        self.shared.connect_attempts.fetch_add(1, Ordering::SeqCst);

        if self.shared.unreachable.load(Ordering::SeqCst) {
            return Err(SwitcherError::connection_failed(address, "unreachable"));
        }

        let (event_tx, event_rx) = mpsc::channel(16);
        if let Ok(mut sessions) = self.shared.sessions.lock() {
            sessions.retain(|s| !s.is_closed());
            sessions.push(event_tx);
        }

        let client = MemorySwitcher {
            address: address.to_string(),
            shared: self.shared.clone(),
        };

        Ok(ClientSession {
            client: Arc::new(client),
            events: event_rx,
        })
    }
}

/// A recording session
pub struct MemorySwitcher {
    address: String,
    shared: Arc<Shared>,
}

#[async_trait]
impl SwitcherClient for MemorySwitcher {
    async fn send(&self, command: SwitcherCommand) -> SwitcherResult<()> {
        if self.shared.fail_commands.load(Ordering::SeqCst) {
            return Err(SwitcherError::command_failed(
                command.operation(),
                "rejected by switcher",
            ));
        }

        if let Ok(mut log) = self.shared.commands.lock() {
            if log.len() >= self.shared.log_limit {
                log.pop_front();
            }
            log.push_back((self.address.clone(), command));
        }
        Ok(())
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_connector_records_commands() {
        let connector = MemoryConnector::new();
        let session = connector.connect("memory").await.unwrap();

        session
            .client
            .send(SwitcherCommand::SetScene {
                scene: "Wide".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(connector.connect_attempts(), 1);
        assert_eq!(connector.scenes(), vec!["Wide".to_string()]);
    }

    #[tokio::test]
    async fn test_memory_connector_failures() {
        let connector = MemoryConnector::new();
        connector.set_reachable(false);
        assert!(connector.connect("memory").await.is_err());

        connector.set_reachable(true);
        let session = connector.connect("memory").await.unwrap();
        connector.set_fail_commands(true);
        let result = session
            .client
            .send(SwitcherCommand::RestartMedia {
                input: "VT".to_string(),
            })
            .await;
        assert!(result.is_err());
        assert!(connector.commands().is_empty());
    }

    #[tokio::test]
    async fn test_command_log_is_bounded() {
        let connector = MemoryConnector::with_log_limit(3);
        let session = connector.connect("memory").await.unwrap();

        for scene in ["A", "B", "C", "D", "E"] {
            session
                .client
                .send(SwitcherCommand::SetScene {
                    scene: scene.to_string(),
                })
                .await
                .unwrap();
        }

        assert_eq!(connector.scenes(), vec!["C", "D", "E"]);
    }

    #[tokio::test]
    async fn test_dropped_sessions_are_pruned() {
        let connector = MemoryConnector::new();
        for _ in 0..5 {
            drop(connector.connect("memory").await.unwrap());
        }
        let _live = connector.connect("memory").await.unwrap();

        assert_eq!(connector.shared.sessions.lock().unwrap().len(), 1);
    }
}
