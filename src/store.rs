use async_trait::async_trait;

use crate::{ByteStream, ProgressFn, SinkResult};

/// Storage client contract consumed by the upload driver.
///
/// The sink treats implementations as opaque: all it requires is a
/// stream-based upload that reports cumulative progress through `progress`
/// and surfaces transport failures as typed errors. Retry and timeout
/// policy belong to the implementation, not to the sink.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload `stream` to `path`, transferring in blocks of roughly
    /// `block_size` bytes where the backend supports it.
    ///
    /// `progress` must be invoked with cumulative bytes transferred so far;
    /// the final invocation must carry the total once the upload completes.
    async fn put_stream(
        &self,
        path: &str,
        stream: ByteStream,
        block_size: u64,
        progress: ProgressFn,
    ) -> SinkResult<StoredObject>;
}

/// Result of a successfully stored object
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub path: String,
    pub size_bytes: u64,
    pub etag: Option<String>,
}
