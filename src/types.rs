use bytes::Bytes;
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use uuid::Uuid;

/// Stream of byte chunks feeding an upload
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Cumulative-progress callback invoked by storage backends during transfer
pub type ProgressFn = Arc<dyn Fn(u64) + Send + Sync>;

/// One-shot signal asking the caller to route further chunks to a fresh sink.
///
/// `FnOnce` makes at-most-once invocation per sink instance a type-level
/// guarantee rather than a runtime check.
pub type RecreateSignal = Box<dyn FnOnce() + Send>;

/// Context for sink operations (tenant, logical item, request info)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkCtx {
    pub tenant_id: String,
    pub item_id: String,
    pub request_id: String,
    pub attributes: serde_json::Value,
}

impl SinkCtx {
    pub fn new<T: Into<String>, I: Into<String>>(tenant_id: T, item_id: I) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            item_id: item_id.into(),
            request_id: Uuid::new_v4().to_string(),
            attributes: serde_json::Value::Null,
        }
    }

    pub fn with_request_id<S: Into<String>>(mut self, request_id: S) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn with_attribute<K: Into<String>, V: serde::Serialize>(mut self, key: K, value: V) -> Self {
        if self.attributes.is_null() {
            self.attributes = serde_json::Value::Object(serde_json::Map::new());
        }
        if let Some(obj) = self.attributes.as_object_mut() {
            obj.insert(key.into(), serde_json::to_value(value).unwrap_or(serde_json::Value::Null));
        }
        self
    }
}
