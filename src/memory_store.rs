use std::collections::HashMap;

use async_trait::async_trait;
use futures_util::StreamExt;
use parking_lot::RwLock;

use crate::{ByteStream, ObjectStore, ProgressFn, SinkError, SinkResult, StoredObject};

/// In-memory backend for testing and development.
///
/// Objects live under explicitly created containers, addressed as
/// `container/key` paths. Uploading into a container that was never created
/// fails with `SinkError::NotFound` through the normal outcome path, which
/// is how tests exercise transport-failure behavior without a network.
pub struct MemoryObjectStore {
    /// Container name -> object key -> content
    containers: RwLock<HashMap<String, HashMap<String, Vec<u8>>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self {
            containers: RwLock::new(HashMap::new()),
        }
    }

    /// Create a container; uploads only succeed into existing containers
    pub fn create_container(&self, name: impl Into<String>) {
        self.containers.write().entry(name.into()).or_default();
    }

    /// Fetch a stored object's content by `container/key` path
    pub fn object(&self, path: &str) -> Option<Vec<u8>> {
        let (container, key) = path.split_once('/')?;
        self.containers.read().get(container)?.get(key).cloned()
    }

    /// Number of objects stored in `container`
    pub fn object_count(&self, container: &str) -> usize {
        self.containers
            .read()
            .get(container)
            .map_or(0, |objects| objects.len())
    }

    fn split_path(path: &str) -> SinkResult<(&str, &str)> {
        path.split_once('/')
            .ok_or_else(|| SinkError::invalid(format!("path '{path}' has no container segment")))
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_stream(
        &self,
        path: &str,
        mut stream: ByteStream,
        _block_size: u64,
        progress: ProgressFn,
    ) -> SinkResult<StoredObject> {
        let (container, key) = Self::split_path(path)?;

        // Drain the whole stream before touching the container map, so the
        // sender side never observes a dropped receiver mid-write.
        let mut content = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            content.extend_from_slice(&chunk);
            progress(content.len() as u64);
        }

        let size_bytes = content.len() as u64;
        let mut containers = self.containers.write();
        let objects = containers
            .get_mut(container)
            .ok_or_else(|| SinkError::not_found(path))?;
        objects.insert(key.to_string(), content);

        Ok(StoredObject {
            path: path.to_string(),
            size_bytes,
            etag: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    fn stream_of(chunks: Vec<&'static [u8]>) -> ByteStream {
        Box::pin(futures_util::stream::iter(
            chunks
                .into_iter()
                .map(|chunk| Ok::<_, std::io::Error>(Bytes::from_static(chunk))),
        ))
    }

    #[tokio::test]
    async fn stores_and_reads_back_content() {
        let store = MemoryObjectStore::new();
        store.create_container("data");

        let stored = store
            .put_stream("data/obj", stream_of(vec![b"hello ", b"world"]), 1024, Arc::new(|_| {}))
            .await
            .expect("put");

        assert_eq!(stored.size_bytes, 11);
        assert_eq!(store.object("data/obj"), Some(b"hello world".to_vec()));
        assert_eq!(store.object_count("data"), 1);
    }

    #[tokio::test]
    async fn reports_cumulative_progress_per_chunk() {
        let store = MemoryObjectStore::new();
        store.create_container("data");

        let last = Arc::new(AtomicU64::new(0));
        let last_in_cb = last.clone();
        store
            .put_stream(
                "data/obj",
                stream_of(vec![b"abc", b"defg"]),
                1024,
                Arc::new(move |loaded| last_in_cb.store(loaded, Ordering::SeqCst)),
            )
            .await
            .expect("put");

        assert_eq!(last.load(Ordering::SeqCst), 7);
    }

    #[tokio::test]
    async fn missing_container_fails_after_drain() {
        let store = MemoryObjectStore::new();

        let err = store
            .put_stream("nope/obj", stream_of(vec![b"data"]), 1024, Arc::new(|_| {}))
            .await
            .expect_err("must fail");

        assert!(matches!(err, SinkError::NotFound { .. }));
    }

    #[tokio::test]
    async fn path_without_container_is_invalid() {
        let store = MemoryObjectStore::new();

        let err = store
            .put_stream("bare-key", stream_of(vec![]), 1024, Arc::new(|_| {}))
            .await
            .expect_err("must fail");

        assert!(matches!(err, SinkError::Invalid { .. }));
    }
}
