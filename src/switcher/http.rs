//! HTTP switcher bridge client
//!
//! Talks to a bridge process sitting in front of the production switcher:
//!
//! - `GET  {address}/status`   - liveness probe (connect + keepalive)
//! - `POST {address}/commands` - one [`SwitcherCommand`] as JSON per call

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::client::{ClientEvent, ClientSession, SwitcherClient, SwitcherConnector};
use super::command::SwitcherCommand;
use super::error::{SwitcherError, SwitcherResult};

// ============================================================================
// Connector
// ============================================================================

/// Configuration for the HTTP bridge connector
#[derive(Debug, Clone)]
pub struct HttpSwitcherConfig {
    /// Per-request timeout
    pub timeout: Duration,

    /// Interval between keepalive probes on an open session
    pub keepalive_interval: Duration,
}

impl Default for HttpSwitcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            keepalive_interval: Duration::from_secs(10),
        }
    }
}

/// Opens [`HttpSwitcherClient`] sessions
pub struct HttpSwitcherConnector {
    config: HttpSwitcherConfig,
    http_client: Client,
}

impl HttpSwitcherConnector {
    pub fn new(config: HttpSwitcherConfig) -> SwitcherResult<Self> {
        let http_client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn with_defaults() -> SwitcherResult<Self> {
        Self::new(HttpSwitcherConfig::default())
    }
}

/// Turn `host:port` or a full URL into a base URL without a trailing slash
fn base_url(address: &str) -> SwitcherResult<String> {
    let trimmed = address.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(SwitcherError::InvalidAddress(address.to_string()));
    }

    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(trimmed.to_string())
    } else if let Some(rest) = trimmed.strip_prefix("ws://") {
        Ok(format!("http://{rest}"))
    } else {
        Ok(format!("http://{trimmed}"))
    }
}

async fn probe(http_client: &Client, base: &str) -> SwitcherResult<()> {
    let response = http_client.get(format!("{base}/status")).send().await?;
    if response.status().is_success() {
        Ok(())
    } else {
        Err(SwitcherError::connection_failed(
            base,
            format!("status probe returned {}", response.status()),
        ))
    }
}

#[async_trait]
impl SwitcherConnector for HttpSwitcherConnector {
    async fn connect(&self, address: &str) -> SwitcherResult<ClientSession> {
        let base = base_url(address)?;

        probe(&self.http_client, &base)
            .await
            .map_err(|e| SwitcherError::connection_failed(address, e.to_string()))?;

        let (event_tx, event_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        spawn_keepalive(
            self.http_client.clone(),
            base.clone(),
            self.config.keepalive_interval,
            event_tx,
            shutdown_rx,
        );

        tracing::info!(address = %base, "Switcher bridge connected");

        let client = HttpSwitcherClient {
            http_client: self.http_client.clone(),
            base,
            shutdown_tx,
        };

        Ok(ClientSession {
            client: Arc::new(client),
            events: event_rx,
        })
    }
}

fn spawn_keepalive(
    http_client: Client,
    base: String,
    every: Duration,
    event_tx: mpsc::Sender<ClientEvent>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = probe(&http_client, &base).await {
                        tracing::warn!(address = %base, error = %e, "Switcher keepalive failed");
                        let _ = event_tx
                            .send(ClientEvent::Closed { reason: e.to_string() })
                            .await;
                        break;
                    }
                }
                _ = shutdown_rx.changed() => {
                    break;
                }
            }
        }
    });
}

// ============================================================================
// Client
// ============================================================================

/// A session against the HTTP bridge
pub struct HttpSwitcherClient {
    http_client: Client,
    base: String,
    shutdown_tx: watch::Sender<bool>,
}

#[async_trait]
impl SwitcherClient for HttpSwitcherClient {
    async fn send(&self, command: SwitcherCommand) -> SwitcherResult<()> {
        let url = format!("{}/commands", self.base);
        let response = self
            .http_client
            .post(&url)
            .json(&command)
            .send()
            .await
            .map_err(|e| SwitcherError::command_failed(command.operation(), e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(SwitcherError::command_failed(
                command.operation(),
                format!("{status}: {body}"),
            ))
        }
    }

    async fn close(&self) {
        let _ = self.shutdown_tx.send(true);
        tracing::debug!(address = %self.base, "Switcher bridge session closed");
    }
}
