//! # blobsink: chunked streaming sink for blob storage
//!
//! `blobsink` accepts the byte chunks an upstream pipeline produces and
//! persists them as objects in a remote blob store, transparently splitting
//! one logical item across multiple objects once a size watermark is
//! crossed. Chunk submission is synchronous and non-blocking; the upload
//! itself runs as a background task fed by a continuous byte stream.
//!
//! ## Key Features
//!
//! - **Streaming-first**: chunks flow straight into the upload stream, never
//!   buffered into a whole-object allocation by the sink
//! - **Size-based splitting**: a per-object watermark triggers a one-shot
//!   recreate signal so the caller can rotate to a fresh sink mid-item
//! - **Deterministic split naming**: per-identity attempt counters give split
//!   objects stable `identity-N` style names within one pipeline run
//! - **Lifecycle events**: start/progress/end events per upload over a
//!   non-blocking broadcast channel, with an optional logging bridge
//! - **Storage agnostic**: any backend implementing `ObjectStore` works;
//!   S3-compatible and in-memory backends ship in-tree
//!
//! ## Quick Start
//!
//! ```rust
//! use blobsink::prelude::*;
//! use blobsink::{MemoryObjectStore, ResolvedTarget, TargetResolver};
//! use bytes::Bytes;
//! use std::sync::Arc;
//!
//! struct ItemResolver {
//!     store: Arc<MemoryObjectStore>,
//! }
//!
//! impl TargetResolver for ItemResolver {
//!     fn object_id(&self, ctx: &SinkCtx) -> String {
//!         ctx.item_id.clone()
//!     }
//!
//!     fn resolve(&self, object_id: &str, attempt: u32, _ctx: &SinkCtx) -> ResolvedTarget {
//!         ResolvedTarget::new(self.store.clone(), format!("exports/{object_id}-{attempt}"))
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> SinkResult<()> {
//! let store = Arc::new(MemoryObjectStore::new());
//! store.create_container("exports");
//!
//! // Once per process: wire resolver, events, config
//! let sink = BlobSink::new(ItemResolver { store: store.clone() });
//!
//! // Once per pipeline run: fresh attempt counters
//! let factory = sink.build();
//!
//! // Once per logical item: a sink instance plus its pending outcome
//! let ctx = SinkCtx::new("tenant-1", "daily-report");
//! let mut handle = factory.create(ctx, Box::new(|| {}));
//! handle.storing.processor(Bytes::from_static(b"hello world"))?;
//! handle.storing.end()?;
//!
//! let stored = handle.outcome.wait().await?;
//! assert_eq!(stored.size_bytes, 11);
//! assert_eq!(store.object("exports/daily-report-0"), Some(b"hello world".to_vec()));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │  Your Pipeline   │  ← produces chunks, reacts to the recreate signal
//! ├──────────────────┤
//! │  BlobSink        │  ← factories, attempt counters, split watermark
//! ├──────────────────┤
//! │  Upload driver   │  ← background task, progress + lifecycle events
//! ├──────────────────┤
//! │  ObjectStore     │  ← storage primitives (S3-compatible, memory, custom)
//! └──────────────────┘
//! ```
//!
//! Splitting is a handshake, not a hidden rotation: when cumulative bytes
//! cross the watermark the sink invokes the caller-supplied recreate signal
//! exactly once and keeps accepting into the same stream. The caller ends
//! the instance at its next convenient boundary and asks the factory for a
//! new one, which lands on the next attempt-numbered object.

mod config;
mod error;
mod events;
mod memory_store;
mod resolver;
mod s3_store;
pub mod sink;
pub mod store;
mod types;
mod upload;

// Re-export main types for clean API
pub use config::{SinkConfig, DEFAULT_BLOCK_SIZE_BYTES};
pub use error::{SinkError, SinkResult};
pub use events::{
    spawn_event_logging, UploadEvent, UploadEventChannel, DEFAULT_EVENT_CAPACITY,
};
pub use memory_store::MemoryObjectStore;
pub use resolver::{ResolvedTarget, TargetResolver};
pub use s3_store::{S3CompatibleStore, S3Config};
pub use sink::{BlobSink, ChunkedSink, SinkFactory, SinkHandle};
pub use store::{ObjectStore, StoredObject};
pub use types::{ByteStream, ProgressFn, RecreateSignal, SinkCtx};
pub use upload::UploadOutcome;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BlobSink, ByteStream, ChunkedSink, SinkConfig, SinkCtx, SinkError, SinkFactory,
        SinkHandle, SinkResult, StoredObject, UploadEvent, UploadEventChannel, UploadOutcome,
    };
}
