//! Stream statistics sources
//!
//! Encoders and ingest servers report per-stream stats in different shapes.
//! Everything is normalised to [`StreamStats`] here so the health monitor
//! only ever sees one key, a bitrate in kbps, and a loss percentage.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use super::error::{CameraError, CameraResult};

/// Normalised stats for one stream
#[derive(Debug, Clone, PartialEq)]
pub struct StreamStats {
    /// Matches `CameraConfig::stats_key`
    pub key: String,
    pub bitrate_kbps: Option<f64>,
    pub loss_percent: Option<f64>,
}

impl StreamStats {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            bitrate_kbps: None,
            loss_percent: None,
        }
    }

    pub fn with_bitrate(mut self, kbps: f64) -> Self {
        self.bitrate_kbps = Some(kbps);
        self
    }

    pub fn with_loss(mut self, percent: f64) -> Self {
        self.loss_percent = Some(percent);
        self
    }
}

/// Anything that can produce a batch of stream stats on demand
#[async_trait]
pub trait StatsSource: Send + Sync {
    async fn fetch(&self) -> CameraResult<Vec<StreamStats>>;

    /// Human-readable name for logs
    fn describe(&self) -> String {
        "stats source".to_string()
    }
}

/// Source for shows without a stats endpoint; reports no streams
#[derive(Debug, Default, Clone, Copy)]
pub struct NoStatsSource;

#[async_trait]
impl StatsSource for NoStatsSource {
    async fn fetch(&self) -> CameraResult<Vec<StreamStats>> {
        Ok(Vec::new())
    }

    fn describe(&self) -> String {
        "none".to_string()
    }
}

// ============================================================================
// HTTP source
// ============================================================================

/// Polls a JSON stats endpoint
pub struct HttpStatsSource {
    url: String,
    http_client: Client,
    /// Last cumulative (lost, received) counters per stream key
    counters: Mutex<HashMap<String, (f64, f64)>>,
}

impl HttpStatsSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> CameraResult<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            http_client,
            counters: Mutex::new(HashMap::new()),
        })
    }

    /// Build the `http://{host}:{port}{path}` endpoint
    pub fn from_endpoint(
        host: &str,
        port: u16,
        path: Option<&str>,
        timeout: Duration,
    ) -> CameraResult<Self> {
        let path = path.unwrap_or("/stats");
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        Self::new(format!("http://{host}:{port}{path}"), timeout)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn normalize_payload(&self, payload: &Value) -> CameraResult<Vec<StreamStats>> {
        let records = stream_records(payload).ok_or_else(|| {
            CameraError::MalformedStats("expected an array of streams".to_string())
        })?;

        let mut counters = self
            .counters
            .lock()
            .map_err(|_| CameraError::MalformedStats("counter state poisoned".to_string()))?;

        let mut out = Vec::with_capacity(records.len());
        for record in records {
            let Some(obj) = record.as_object() else {
                continue;
            };
            let Some(key) = stream_key(obj) else {
                continue;
            };

            let mut stats = StreamStats::new(key.clone());
            stats.bitrate_kbps = bitrate_kbps(obj);
            stats.loss_percent = direct_loss(obj).or_else(|| {
                let current = loss_counters(obj)?;
                let previous = counters.insert(key, current);
                Some(loss_from_counters(previous, current))
            });
            out.push(stats);
        }

        Ok(out)
    }
}

#[async_trait]
impl StatsSource for HttpStatsSource {
    async fn fetch(&self) -> CameraResult<Vec<StreamStats>> {
        let response = self
            .http_client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| CameraError::stats_fetch(&self.url, e.to_string()))?;

        if !response.status().is_success() {
            return Err(CameraError::stats_fetch(
                &self.url,
                format!("HTTP {}", response.status()),
            ));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| CameraError::MalformedStats(e.to_string()))?;

        self.normalize_payload(&payload)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

// ============================================================================
// Field normalisation
// ============================================================================

/// Accept a bare array or an object wrapping one
fn stream_records(payload: &Value) -> Option<&Vec<Value>> {
    match payload {
        Value::Array(items) => Some(items),
        Value::Object(obj) => ["streams", "publishers", "data"]
            .iter()
            .find_map(|field| obj.get(*field).and_then(Value::as_array)),
        _ => None,
    }
}

fn stream_key(obj: &Map<String, Value>) -> Option<String> {
    ["port", "key", "streamId", "id", "name"]
        .iter()
        .find_map(|field| match obj.get(*field)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

/// First numeric field present; numeric strings are accepted too
fn number(obj: &Map<String, Value>, fields: &[&str]) -> Option<f64> {
    fields.iter().find_map(|field| match obj.get(*field)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn bitrate_kbps(obj: &Map<String, Value>) -> Option<f64> {
    number(obj, &["bitrate", "bitrateKbps", "bitrate_kbps"])
        .or_else(|| number(obj, &["mbpsRecvRate", "bitrateMbps"]).map(|mbps| mbps * 1000.0))
}

fn direct_loss(obj: &Map<String, Value>) -> Option<f64> {
    number(obj, &["lossPercent", "packetLossPercent", "packet_loss"])
}

fn loss_counters(obj: &Map<String, Value>) -> Option<(f64, f64)> {
    let pairs = [("pktRcvLoss", "pktRecv"), ("packetsLost", "packetsReceived")];
    pairs
        .iter()
        .find_map(|&(lost, received)| Some((number(obj, &[lost])?, number(obj, &[received])?)))
}

/// Loss percentage from (lost, received) counters
///
/// Counters that only grow are diffed against the previous poll; a counter
/// that went backwards (stream restarted) is used as-is.
fn loss_from_counters(previous: Option<(f64, f64)>, current: (f64, f64)) -> f64 {
    let (lost, received) = match previous {
        Some((prev_lost, prev_recv)) if current.0 >= prev_lost && current.1 >= prev_recv => {
            (current.0 - prev_lost, current.1 - prev_recv)
        }
        _ => current,
    };

    if received <= 0.0 {
        return if lost > 0.0 { 100.0 } else { 0.0 };
    }
    (lost / received * 100.0).clamp(0.0, 100.0)
}
