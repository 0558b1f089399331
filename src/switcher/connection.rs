//! A live switcher connection for one show

use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::client::SwitcherClient;
use super::command::SwitcherCommand;
use super::error::SwitcherResult;

/// Handle to the switcher session owned by the pool for a show
///
/// Commands are forwarded as-is; a failing command is returned to the caller
/// and never changes the pool's view of the connection.
pub struct SwitcherConnection {
    show_id: String,
    address: String,
    connected_at: DateTime<Utc>,
    client: Arc<dyn SwitcherClient>,
}

impl SwitcherConnection {
    pub(crate) fn new(
        show_id: impl Into<String>,
        address: impl Into<String>,
        client: Arc<dyn SwitcherClient>,
    ) -> Self {
        Self {
            show_id: show_id.into(),
            address: address.into(),
            connected_at: Utc::now(),
            client,
        }
    }

    pub fn show_id(&self) -> &str {
        &self.show_id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Issue a raw command
    pub async fn send(&self, command: SwitcherCommand) -> SwitcherResult<()> {
        tracing::debug!(show_id = %self.show_id, command = %command, "Switcher command");
        self.client.send(command).await
    }

    pub async fn set_scene(&self, scene: &str) -> SwitcherResult<()> {
        self.send(SwitcherCommand::SetScene {
            scene: scene.to_string(),
        })
        .await
    }

    pub(crate) async fn close(&self) {
        self.client.close().await;
    }
}

impl std::fmt::Debug for SwitcherConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwitcherConnection")
            .field("show_id", &self.show_id)
            .field("address", &self.address)
            .field("connected_at", &self.connected_at)
            .finish()
    }
}
