use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::{
    upload, RecreateSignal, SinkConfig, SinkCtx, SinkError, SinkResult, TargetResolver,
    UploadEventChannel, UploadOutcome,
};

/// Entry point for routing pipeline output into blob storage.
///
/// Holds the caller-supplied resolver plus optional event channel and
/// config defaults; `build` produces one `SinkFactory` per pipeline run.
pub struct BlobSink {
    resolver: Arc<dyn TargetResolver>,
    events: Option<UploadEventChannel>,
    config: SinkConfig,
}

impl BlobSink {
    pub fn new<R: TargetResolver + 'static>(resolver: R) -> Self {
        Self {
            resolver: Arc::new(resolver),
            events: None,
            config: SinkConfig::default(),
        }
    }

    /// Attach an event channel; without one, lifecycle events are not emitted
    pub fn with_events(mut self, channel: UploadEventChannel) -> Self {
        self.events = Some(channel);
        self
    }

    /// Override the default size thresholds
    pub fn with_config(mut self, config: SinkConfig) -> Self {
        self.config = config;
        self
    }

    /// Create a per-run factory with a fresh attempt-counter map.
    ///
    /// Counters never carry over between factories: two runs storing the
    /// same logical item both start that item's attempts at 0.
    pub fn build(&self) -> SinkFactory {
        SinkFactory {
            resolver: self.resolver.clone(),
            events: self.events.clone(),
            config: self.config.clone(),
            attempts: Mutex::new(HashMap::new()),
        }
    }
}

/// Per-run sink factory.
///
/// Owns the identity -> attempt counter map for one pipeline run. The map
/// is the only state shared across sink instances, and its mutation is
/// serialized, so parallel pipeline branches can create sinks concurrently.
pub struct SinkFactory {
    resolver: Arc<dyn TargetResolver>,
    events: Option<UploadEventChannel>,
    config: SinkConfig,
    attempts: Mutex<HashMap<String, u32>>,
}

impl SinkFactory {
    /// Create a sink instance for one logical item (or one split of it).
    ///
    /// Re-derives the object identity from `ctx`, hands the identity's
    /// current attempt counter to the resolver, and bumps the counter for
    /// the next request. `on_split` fires at most once, when cumulative
    /// bytes first exceed the resolved watermark; the caller is expected
    /// to `end` this instance promptly and route further chunks to a new
    /// one. Synchronous apart from spawning the upload task.
    pub fn create(&self, ctx: SinkCtx, on_split: RecreateSignal) -> SinkHandle {
        let object_id = self.resolver.object_id(&ctx);
        let attempt = {
            let mut attempts = self.attempts.lock();
            *attempts
                .entry(object_id.clone())
                .and_modify(|count| *count += 1)
                .or_insert(0)
        };

        let target = self.resolver.resolve(&object_id, attempt, &ctx);
        let max_object_bytes = target.max_object_bytes.unwrap_or(self.config.max_object_bytes);
        let block_size = target.block_size_bytes.unwrap_or(self.config.block_size_bytes);
        debug!(
            object_id = %object_id,
            attempt,
            path = %target.path,
            max_object_bytes,
            "creating sink instance"
        );

        let (sender, receiver) = mpsc::unbounded_channel();
        let outcome = upload::spawn_upload(
            target.store,
            target.path.clone(),
            block_size,
            ctx,
            self.events.clone(),
            receiver,
        );

        SinkHandle {
            storing: ChunkedSink {
                sender: Some(sender),
                path: target.path,
                bytes_written: 0,
                max_object_bytes,
                on_split: Some(on_split),
            },
            outcome,
        }
    }
}

/// One sink instance plus the deferred result of its upload
pub struct SinkHandle {
    pub storing: ChunkedSink,
    pub outcome: UploadOutcome,
}

/// Chunk-accepting side of one object upload.
///
/// State machine: OPEN (accepting chunks) -> ENDED (stream finalized,
/// upload settling) -> SETTLED (outcome resolved). `processor` and `end`
/// on an ended sink fail with `SinkError::SinkEnded`; silently dropping
/// late chunks would corrupt split boundaries.
pub struct ChunkedSink {
    sender: Option<mpsc::UnboundedSender<Bytes>>,
    path: String,
    bytes_written: u64,
    max_object_bytes: u64,
    on_split: Option<RecreateSignal>,
}

impl ChunkedSink {
    /// Append a chunk to the stream feeding this object's upload.
    ///
    /// Non-blocking: the chunk is queued for the background upload task.
    /// When a positive watermark is configured and cumulative bytes first
    /// exceed it, the recreate signal fires exactly once; the same stream
    /// keeps accepting chunks after that, since the watermark is advisory
    /// rather than a mid-stream cutoff.
    pub fn processor(&mut self, chunk: Bytes) -> SinkResult<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| SinkError::sink_ended(self.path.clone()))?;

        let chunk_len = chunk.len() as u64;
        sender
            .send(chunk)
            .map_err(|_| SinkError::upload_failed("upload task is no longer accepting bytes"))?;
        self.bytes_written += chunk_len;

        if self.max_object_bytes > 0 && self.bytes_written > self.max_object_bytes {
            if let Some(signal) = self.on_split.take() {
                debug!(path = %self.path, bytes = self.bytes_written, "size watermark crossed");
                signal();
            }
        }
        Ok(())
    }

    /// Signal that no further bytes will arrive, finalizing the stream so
    /// the pending upload can complete. Calling `end` twice fails with
    /// `SinkError::SinkEnded`.
    pub fn end(&mut self) -> SinkResult<()> {
        self.sender
            .take()
            .map(drop)
            .ok_or_else(|| SinkError::sink_ended(self.path.clone()))
    }

    /// Cumulative bytes accepted by `processor`
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Destination path this sink feeds
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the recreate signal has already fired
    pub fn split_requested(&self) -> bool {
        self.on_split.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn open_sink(max_object_bytes: u64, fired: Arc<AtomicU32>) -> (ChunkedSink, mpsc::UnboundedReceiver<Bytes>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let sink = ChunkedSink {
            sender: Some(sender),
            path: "data/obj-0".to_string(),
            bytes_written: 0,
            max_object_bytes,
            on_split: Some(Box::new(move || {
                fired.fetch_add(1, Ordering::SeqCst);
            })),
        };
        (sink, receiver)
    }

    #[test]
    fn watermark_zero_never_signals() {
        let fired = Arc::new(AtomicU32::new(0));
        let (mut sink, _receiver) = open_sink(0, fired.clone());

        for _ in 0..100 {
            sink.processor(Bytes::from_static(b"0123456789")).expect("processor");
        }

        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!sink.split_requested());
        assert_eq!(sink.bytes_written(), 1000);
    }

    #[test]
    fn signal_fires_once_at_crossing_chunk() {
        let fired = Arc::new(AtomicU32::new(0));
        let (mut sink, _receiver) = open_sink(10, fired.clone());

        sink.processor(Bytes::from_static(b"1234")).expect("processor");
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        sink.processor(Bytes::from_static(b"5678")).expect("processor");
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        // 12 bytes > 10: this chunk crosses the watermark
        sink.processor(Bytes::from_static(b"9abc")).expect("processor");
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(sink.split_requested());

        // Same stream keeps accepting, signal stays one-shot
        sink.processor(Bytes::from_static(b"more")).expect("processor");
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn processor_and_end_fail_after_end() {
        let fired = Arc::new(AtomicU32::new(0));
        let (mut sink, _receiver) = open_sink(0, fired);

        sink.end().expect("first end");

        let err = sink.processor(Bytes::from_static(b"late")).expect_err("must fail");
        assert!(matches!(err, SinkError::SinkEnded { .. }));

        let err = sink.end().expect_err("second end must fail");
        assert!(matches!(err, SinkError::SinkEnded { .. }));
    }
}
