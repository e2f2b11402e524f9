/// Default transfer block size when a resolved target does not specify one (1 MiB)
pub const DEFAULT_BLOCK_SIZE_BYTES: u64 = 1024 * 1024;

/// Configuration for sink operations
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Size watermark after which the recreate signal fires (bytes, 0 = never split).
    /// A `ResolvedTarget` may override this per object.
    pub max_object_bytes: u64,

    /// Transfer block size hint handed to the storage backend.
    /// A `ResolvedTarget` may override this per object.
    pub block_size_bytes: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            max_object_bytes: 0,
            block_size_bytes: DEFAULT_BLOCK_SIZE_BYTES,
        }
    }
}

impl SinkConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the split watermark in bytes (0 disables splitting)
    pub fn with_max_object_bytes(mut self, bytes: u64) -> Self {
        self.max_object_bytes = bytes;
        self
    }

    /// Set the transfer block size hint
    pub fn with_block_size_bytes(mut self, bytes: u64) -> Self {
        self.block_size_bytes = bytes;
        self
    }
}
