use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::SinkCtx;

/// Default buffered capacity of an event channel
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Lifecycle events for one object upload.
///
/// Per sink instance the order is fixed: exactly one `Started`, zero or more
/// `Progressed`, exactly one terminal `Ended` (success or failure).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum UploadEvent {
    /// Upload was initiated, before any bytes moved
    Started {
        context: SinkCtx,
        blob_path: String,
        at: DateTime<Utc>,
    },

    /// Transport reported cumulative progress.
    ///
    /// `bytes_uploaded` is what the transport saw, which may lag the bytes
    /// already accepted by the sink mid-transfer.
    Progressed {
        context: SinkCtx,
        blob_path: String,
        bytes_uploaded: u64,
        at: DateTime<Utc>,
    },

    /// Upload settled, with the captured error on failure
    Ended {
        context: SinkCtx,
        blob_path: String,
        bytes_uploaded: u64,
        error: Option<String>,
        at: DateTime<Utc>,
    },
}

impl UploadEvent {
    /// Get event type name as string
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Started { .. } => "upload_start",
            Self::Progressed { .. } => "upload_progress",
            Self::Ended { .. } => "upload_end",
        }
    }

    /// Get the destination path from any event
    pub fn blob_path(&self) -> &str {
        match self {
            Self::Started { blob_path, .. } => blob_path,
            Self::Progressed { blob_path, .. } => blob_path,
            Self::Ended { blob_path, .. } => blob_path,
        }
    }

    /// Get the caller context from any event
    pub fn context(&self) -> &SinkCtx {
        match self {
            Self::Started { context, .. } => context,
            Self::Progressed { context, .. } => context,
            Self::Ended { context, .. } => context,
        }
    }

    /// Get the timestamp from any event
    pub fn timestamp(&self) -> &DateTime<Utc> {
        match self {
            Self::Started { at, .. } => at,
            Self::Progressed { at, .. } => at,
            Self::Ended { at, .. } => at,
        }
    }
}

/// Clonable publish/subscribe handle for upload lifecycle events.
///
/// Emission is fire-and-forget: slow or absent subscribers never block the
/// data path.
#[derive(Clone)]
pub struct UploadEventChannel {
    sender: broadcast::Sender<UploadEvent>,
}

impl UploadEventChannel {
    /// Create a channel with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Create a channel buffering up to `capacity` events per subscriber
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber
    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.sender.subscribe()
    }

    pub(crate) fn emit(&self, event: UploadEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for UploadEventChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn a task that logs upload events from `channel` via `tracing`.
///
/// `Started` and successful `Ended` events log at info, failures at warn,
/// and `Progressed` at debug when `print_progress` is set. The task exits
/// once every sender side of the channel is gone.
pub fn spawn_event_logging(
    channel: &UploadEventChannel,
    print_progress: bool,
) -> tokio::task::JoinHandle<()> {
    let mut receiver = channel.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(UploadEvent::Started { context, blob_path, .. }) => {
                    info!(
                        tenant = %context.tenant_id,
                        item = %context.item_id,
                        path = %blob_path,
                        "initiating upload"
                    );
                }
                Ok(UploadEvent::Progressed { blob_path, bytes_uploaded, .. }) => {
                    if print_progress {
                        debug!(path = %blob_path, bytes = bytes_uploaded, "upload progress");
                    }
                }
                Ok(UploadEvent::Ended { blob_path, bytes_uploaded, error, .. }) => match error {
                    Some(error) => {
                        warn!(path = %blob_path, bytes = bytes_uploaded, %error, "upload failed");
                    }
                    None => {
                        info!(path = %blob_path, bytes = bytes_uploaded, "upload complete");
                    }
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "event logger lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_ctx() -> SinkCtx {
        SinkCtx::new("tenant", "item")
    }

    #[test]
    fn event_names_are_stable() {
        let started = UploadEvent::Started {
            context: test_ctx(),
            blob_path: "c/obj-0".to_string(),
            at: Utc::now(),
        };
        let progressed = UploadEvent::Progressed {
            context: test_ctx(),
            blob_path: "c/obj-0".to_string(),
            bytes_uploaded: 7,
            at: Utc::now(),
        };
        let ended = UploadEvent::Ended {
            context: test_ctx(),
            blob_path: "c/obj-0".to_string(),
            bytes_uploaded: 7,
            error: None,
            at: Utc::now(),
        };

        assert_eq!(started.event_name(), "upload_start");
        assert_eq!(progressed.event_name(), "upload_progress");
        assert_eq!(ended.event_name(), "upload_end");
    }

    #[test]
    fn accessors_reach_every_variant() {
        let event = UploadEvent::Progressed {
            context: test_ctx(),
            blob_path: "c/obj-0".to_string(),
            bytes_uploaded: 42,
            at: Utc::now(),
        };

        assert_eq!(event.blob_path(), "c/obj-0");
        assert_eq!(event.context().item_id, "item");
    }

    #[tokio::test]
    async fn channel_delivers_to_subscribers() {
        let channel = UploadEventChannel::with_capacity(8);
        let mut receiver = channel.subscribe();

        channel.emit(UploadEvent::Started {
            context: test_ctx(),
            blob_path: "c/obj-0".to_string(),
            at: Utc::now(),
        });

        let event = receiver.recv().await.expect("event");
        assert_eq!(event.event_name(), "upload_start");
    }

    #[test]
    fn emit_without_subscribers_is_a_no_op() {
        let channel = UploadEventChannel::new();
        channel.emit(UploadEvent::Started {
            context: test_ctx(),
            blob_path: "c/obj-0".to_string(),
            at: Utc::now(),
        });
    }
}
