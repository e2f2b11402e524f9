use std::sync::Arc;

use crate::{ObjectStore, SinkCtx};

/// Caller-supplied resolution from logical identity to a concrete destination.
///
/// `resolve` receives the attempt counter the factory maintains per identity,
/// so split objects belonging to the same logical item get deterministic,
/// caller-visible names (identity plus counter suffix, typically).
/// Implementations should behave as pure functions of their inputs; failing
/// to resolve is the caller's responsibility to avoid.
pub trait TargetResolver: Send + Sync {
    /// Derive the logical object identity from the caller context
    fn object_id(&self, ctx: &SinkCtx) -> String;

    /// Produce the destination for one upload attempt of `object_id`
    fn resolve(&self, object_id: &str, attempt: u32, ctx: &SinkCtx) -> ResolvedTarget;
}

/// A concrete upload destination plus per-object size thresholds
pub struct ResolvedTarget {
    pub store: Arc<dyn ObjectStore>,
    pub path: String,

    /// Split watermark override; `None` falls back to `SinkConfig`
    pub max_object_bytes: Option<u64>,

    /// Transfer block size override; `None` falls back to `SinkConfig`
    pub block_size_bytes: Option<u64>,
}

impl ResolvedTarget {
    pub fn new(store: Arc<dyn ObjectStore>, path: impl Into<String>) -> Self {
        Self {
            store,
            path: path.into(),
            max_object_bytes: None,
            block_size_bytes: None,
        }
    }

    /// Set the split watermark for this object (0 disables splitting)
    pub fn with_max_object_bytes(mut self, bytes: u64) -> Self {
        self.max_object_bytes = Some(bytes);
        self
    }

    /// Set the transfer block size for this object
    pub fn with_block_size_bytes(mut self, bytes: u64) -> Self {
        self.block_size_bytes = Some(bytes);
        self
    }
}
