//! Debounced streaming of narration chunks.
//!
//! Complete lines go out immediately; a trailing partial line waits for a
//! quiet period, with the timer reset by every new chunk. Same newline policy
//! as the byte-level reassembler, applied at the narration layer.

use super::{NotificationSink, Outbound};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::warn;

pub struct StreamerOptions {
    pub quiet_period: Duration,
    pub prefix: String,
}

impl Default for StreamerOptions {
    fn default() -> Self {
        Self {
            quiet_period: Duration::from_millis(1500),
            prefix: String::new(),
        }
    }
}

pub struct MessageStreamer {
    inner: Arc<Inner>,
}

struct Inner {
    sink: Arc<dyn NotificationSink>,
    options: StreamerOptions,
    buffer: Mutex<String>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl MessageStreamer {
    pub fn new(sink: Arc<dyn NotificationSink>, options: StreamerOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                sink,
                options,
                buffer: Mutex::new(String::new()),
                timer: Mutex::new(None),
            }),
        }
    }

    /// Append a chunk. Complete lines are delivered at once; a remaining
    /// partial line re-arms the quiet-period timer.
    pub async fn push_chunk(&self, chunk: &str) {
        let inner = &self.inner;
        inner.cancel_timer().await;

        let complete = {
            let mut buffer = inner.buffer.lock().await;
            buffer.push_str(chunk);
            match buffer.rfind('\n') {
                Some(pos) => {
                    let rest = buffer.split_off(pos + 1);
                    let mut complete = std::mem::replace(&mut *buffer, rest);
                    complete.pop(); // delimiter
                    Some(complete)
                }
                None => None,
            }
        };
        if let Some(complete) = complete {
            inner.deliver(&complete).await;
        }

        let has_partial = !inner.buffer.lock().await.is_empty();
        if has_partial {
            let armed = Arc::clone(inner);
            let handle = tokio::spawn(async move {
                tokio::time::sleep(armed.options.quiet_period).await;
                // Detach our own handle before delivering; a concurrent push
                // that grabbed it first will abort us harmlessly.
                let _ = armed.timer.lock().await.take();
                armed.deliver_buffered().await;
            });
            *inner.timer.lock().await = Some(handle);
        }
    }

    /// Deliver whatever is buffered right now.
    pub async fn flush(&self) {
        self.inner.cancel_timer().await;
        self.inner.deliver_buffered().await;
    }
}

impl Inner {
    async fn cancel_timer(&self) {
        if let Some(timer) = self.timer.lock().await.take() {
            timer.abort();
        }
    }

    async fn deliver_buffered(&self) {
        let text = {
            let mut buffer = self.buffer.lock().await;
            std::mem::take(&mut *buffer)
        };
        if !text.is_empty() {
            self.deliver(&text).await;
        }
    }

    async fn deliver(&self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        let message = format!("{}{}", self.options.prefix, text);
        if let Err(err) = self.sink.send(&message).await {
            warn!(err = %err, "streamed delivery failed");
        }
    }
}

#[async_trait]
impl Outbound for MessageStreamer {
    async fn push(&self, text: String) {
        // Callers push whole messages; terminate them so each is a line.
        let chunk = if text.ends_with('\n') {
            text
        } else {
            format!("{text}\n")
        };
        self.push_chunk(&chunk).await;
    }

    async fn drain(&self) {
        self.flush().await;
    }
}
