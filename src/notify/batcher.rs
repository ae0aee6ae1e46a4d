//! Fixed-interval batching of outbound messages.
//!
//! A worker task wakes on a recurring timer, takes up to a batch worth of
//! pending messages, and delivers them as one digest. Draining wakes the
//! worker immediately and flushes the rest of the queue batch by batch.

use super::{NotificationSink, Outbound};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A message waiting for the next flush.
#[derive(Debug)]
struct PendingMessage {
    text: String,
    enqueued_at: Instant,
}

/// Compresses several pending updates into one message. Failures fall back to
/// the numbered digest and never surface to callers.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, messages: &[String]) -> anyhow::Result<String>;
}

pub struct BatcherOptions {
    pub interval: Duration,
    pub max_batch_size: usize,
    pub summarizer: Option<Arc<dyn Summarizer>>,
}

impl Default for BatcherOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            max_batch_size: 10,
            summarizer: None,
        }
    }
}

pub struct MessageBatcher {
    tx: Mutex<Option<mpsc::UnboundedSender<PendingMessage>>>,
    shutdown: Arc<Notify>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl MessageBatcher {
    pub fn new(sink: Arc<dyn NotificationSink>, options: BatcherOptions) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = Arc::new(Notify::new());
        let worker = tokio::spawn(batch_worker(rx, sink, options, Arc::clone(&shutdown)));
        Self {
            tx: Mutex::new(Some(tx)),
            shutdown,
            worker: Mutex::new(Some(worker)),
        }
    }
}

#[async_trait]
impl Outbound for MessageBatcher {
    async fn push(&self, text: String) {
        let tx = self.tx.lock().await;
        match tx.as_ref() {
            Some(tx) => {
                let message = PendingMessage {
                    text,
                    enqueued_at: Instant::now(),
                };
                if tx.send(message).is_err() {
                    warn!("batch worker is gone; message dropped");
                }
            }
            None => warn!("message pushed after drain; dropped"),
        }
    }

    async fn drain(&self) {
        // Closing the channel lets the worker observe end-of-input; the
        // notify skips the wait for the next tick.
        self.tx.lock().await.take();
        self.shutdown.notify_one();
        if let Some(worker) = self.worker.lock().await.take() {
            if let Err(err) = worker.await {
                warn!(err = %err, "batch worker panicked");
            }
        }
    }
}

async fn batch_worker(
    mut rx: mpsc::UnboundedReceiver<PendingMessage>,
    sink: Arc<dyn NotificationSink>,
    options: BatcherOptions,
    shutdown: Arc<Notify>,
) {
    let mut ticker = tokio::time::interval(options.interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await; // consume the immediate first tick
    let mut draining = false;

    loop {
        if !draining {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.notified() => draining = true,
            }
        }

        let mut batch = Vec::new();
        while batch.len() < options.max_batch_size {
            match rx.try_recv() {
                Ok(message) => batch.push(message),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    draining = true;
                    break;
                }
            }
        }

        if batch.is_empty() {
            if draining {
                break;
            }
            continue;
        }
        deliver_batch(sink.as_ref(), &options, batch).await;
        // While draining, loop straight back to flush the remainder.
    }
}

/// Delivery failures are logged and do not block later batches.
async fn deliver_batch(
    sink: &dyn NotificationSink,
    options: &BatcherOptions,
    batch: Vec<PendingMessage>,
) {
    let oldest_ms = batch
        .first()
        .map(|m| m.enqueued_at.elapsed().as_millis() as u64)
        .unwrap_or_default();
    debug!(size = batch.len(), oldest_ms, "flushing message batch");

    let text = format_batch(&batch, options).await;
    if let Err(err) = sink.send(&text).await {
        warn!(err = %err, size = batch.len(), "batch delivery failed");
    }
}

async fn format_batch(batch: &[PendingMessage], options: &BatcherOptions) -> String {
    if batch.len() == 1 {
        return batch[0].text.clone();
    }

    let texts: Vec<String> = batch.iter().map(|m| m.text.clone()).collect();
    if let Some(summarizer) = &options.summarizer {
        match summarizer.summarize(&texts).await {
            Ok(summary) => return summary,
            Err(err) => debug!(err = %err, "summarizer failed, using digest format"),
        }
    }

    let items = texts
        .iter()
        .enumerate()
        .map(|(i, text)| format!("{}. {}", i + 1, text))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Agent update ({} items):\n{}", texts.len(), items)
}
