//! Outbound notification delivery: the sink contract and pacing strategies.
//!
//! The rest of the crate depends only on `NotificationSink` (the one
//! capability needed from a chat platform) and `Outbound` (enqueue now,
//! deliver soon). Concrete pacing lives in `batcher` and `streamer`.

pub mod batcher;
pub mod streamer;

pub use batcher::{BatcherOptions, MessageBatcher, Summarizer};
pub use streamer::{MessageStreamer, StreamerOptions};

use crate::errors::SinkError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Acknowledgement returned by a notification sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkAck {
    pub id: String,
    pub timestamp: DateTime<Utc>,
}

impl SinkAck {
    /// Ack minted locally when the platform does not return one.
    fn local() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// The only capability Herald needs from a chat platform.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, text: &str) -> Result<SinkAck, SinkError>;
}

/// A pacing strategy in front of a sink.
///
/// Both implementations guarantee: every pushed message is eventually
/// delivered, in push order, with bounded delay, exactly once (individually
/// or merged into a batch).
#[async_trait]
pub trait Outbound: Send + Sync {
    /// Enqueue one message for delivery.
    async fn push(&self, text: String);
    /// Deliver everything still queued, then stop accepting. Idempotent.
    async fn drain(&self);
}

/// Posts messages to an HTTP endpoint as `{text, thread_id}` JSON.
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
    thread_id: String,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>, thread_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            thread_id: thread_id.into(),
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn send(&self, text: &str) -> Result<SinkAck, SinkError> {
        let response = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({
                "text": text,
                "thread_id": self.thread_id,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        // Ack shapes differ between platforms; mint one locally if the
        // response does not parse.
        match response.json::<SinkAck>().await {
            Ok(ack) => Ok(ack),
            Err(err) => {
                debug!(err = %err, "sink response had no usable ack");
                Ok(SinkAck::local())
            }
        }
    }
}

/// Prints messages to stdout. Used when no webhook is configured.
pub struct ConsoleSink;

#[async_trait]
impl NotificationSink for ConsoleSink {
    async fn send(&self, text: &str) -> Result<SinkAck, SinkError> {
        println!("{text}");
        Ok(SinkAck::local())
    }
}
