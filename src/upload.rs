use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

use crate::{
    ByteStream, ObjectStore, ProgressFn, SinkCtx, SinkError, SinkResult, StoredObject,
    UploadEvent, UploadEventChannel,
};

/// Drive one object's upload as a background task fed by `receiver`.
///
/// The start event fires synchronously here, before any byte is handed to
/// the transport, so it always precedes progress events from the spawned
/// task. The terminal end event is emitted on both the success and failure
/// arm after the transport call settles; the transport error itself is
/// returned untouched so the caller still observes it via the outcome.
pub(crate) fn spawn_upload(
    store: Arc<dyn ObjectStore>,
    path: String,
    block_size: u64,
    ctx: SinkCtx,
    events: Option<UploadEventChannel>,
    receiver: mpsc::UnboundedReceiver<Bytes>,
) -> UploadOutcome {
    if let Some(channel) = &events {
        channel.emit(UploadEvent::Started {
            context: ctx.clone(),
            blob_path: path.clone(),
            at: Utc::now(),
        });
    }

    // Transport-reported cumulative bytes; may lag the sink's own counter
    // mid-transfer, equals it once the upload settles successfully.
    let uploaded = Arc::new(AtomicU64::new(0));
    let progress: ProgressFn = {
        let uploaded = uploaded.clone();
        let events = events.clone();
        let ctx = ctx.clone();
        let path = path.clone();
        Arc::new(move |loaded_bytes| {
            uploaded.store(loaded_bytes, Ordering::SeqCst);
            if let Some(channel) = &events {
                channel.emit(UploadEvent::Progressed {
                    context: ctx.clone(),
                    blob_path: path.clone(),
                    bytes_uploaded: loaded_bytes,
                    at: Utc::now(),
                });
            }
        })
    };

    let handle = tokio::spawn(async move {
        let stream: ByteStream =
            Box::pin(UnboundedReceiverStream::new(receiver).map(Ok::<Bytes, std::io::Error>));
        let result = store.put_stream(&path, stream, block_size, progress).await;

        let bytes_uploaded = uploaded.load(Ordering::SeqCst);
        if let Some(channel) = &events {
            channel.emit(UploadEvent::Ended {
                context: ctx,
                blob_path: path.clone(),
                bytes_uploaded,
                error: result.as_ref().err().map(|err| err.to_string()),
                at: Utc::now(),
            });
        }

        match &result {
            Ok(stored) => debug!(path = %path, bytes = stored.size_bytes, "object stored"),
            Err(err) => debug!(path = %path, bytes = bytes_uploaded, %err, "upload settled with error"),
        }
        result
    });

    UploadOutcome { handle }
}

/// Deferred result of one object's upload.
///
/// Owned independently of the sink instance that fed it; callers must
/// retain it to observe completion, and it stays valid after the sink has
/// been ended and dropped.
pub struct UploadOutcome {
    handle: JoinHandle<SinkResult<StoredObject>>,
}

impl UploadOutcome {
    /// Await the upload's terminal result
    pub async fn wait(self) -> SinkResult<StoredObject> {
        match self.handle.await {
            Ok(result) => result,
            Err(err) => Err(SinkError::upload_failed(format!("upload task aborted: {err}"))),
        }
    }

    /// Whether the upload task has already settled
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
