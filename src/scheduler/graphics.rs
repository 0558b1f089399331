//! Graphics trigger seam
//!
//! The scheduler tells the graphics system which segment went on air; what it
//! renders is the graphics system's business.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::models::{Segment, SegmentType};

#[derive(Error, Debug)]
pub enum GraphicsError {
    #[error("Graphics request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Graphics endpoint returned status {status}")]
    Status { status: u16 },
}

/// Something that can put a segment's graphic on air
#[async_trait]
pub trait GraphicsController: Send + Sync {
    async fn trigger(&self, show_id: &str, segment: &Segment) -> Result<(), GraphicsError>;
}

#[derive(Debug, Serialize)]
struct TriggerPayload<'a> {
    show_id: &'a str,
    segment_id: &'a str,
    segment_name: &'a str,
    segment_type: SegmentType,
    graphic_ref: Option<&'a str>,
}

/// Posts graphic triggers to a webhook as JSON
pub struct HttpGraphicsController {
    client: reqwest::Client,
    url: String,
}

impl HttpGraphicsController {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, GraphicsError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl GraphicsController for HttpGraphicsController {
    async fn trigger(&self, show_id: &str, segment: &Segment) -> Result<(), GraphicsError> {
        let payload = TriggerPayload {
            show_id,
            segment_id: &segment.id,
            segment_name: &segment.name,
            segment_type: segment.segment_type,
            graphic_ref: segment.graphic_ref.as_deref(),
        };

        let response = self.client.post(&self.url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GraphicsError::Status {
                status: status.as_u16(),
            });
        }

        tracing::debug!(show_id, segment_id = %segment.id, "Graphic triggered");
        Ok(())
    }
}
