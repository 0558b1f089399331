//! Protocol seam between the connection pool and a concrete switcher
//!
//! The pool only ever talks to a [`SwitcherConnector`] (to open sessions) and
//! the [`SwitcherClient`] it hands back (to issue commands).

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::command::SwitcherCommand;
use super::error::SwitcherResult;

/// Asynchronous notifications raised by an open session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The remote side went away; the pool will reconnect
    Closed { reason: String },

    /// Informational message from the switcher
    Notice { message: String },
}

/// An open session able to issue switcher commands
#[async_trait]
pub trait SwitcherClient: Send + Sync {
    /// Issue one command and wait for its acknowledgement
    async fn send(&self, command: SwitcherCommand) -> SwitcherResult<()>;

    /// Tear the session down
    async fn close(&self);
}

/// Result of a successful connect
pub struct ClientSession {
    pub client: Arc<dyn SwitcherClient>,
    pub events: mpsc::Receiver<ClientEvent>,
}

/// Opens sessions to a switcher address
#[async_trait]
pub trait SwitcherConnector: Send + Sync {
    async fn connect(&self, address: &str) -> SwitcherResult<ClientSession>;
}
