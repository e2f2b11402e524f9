use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::primitives::ByteStream as S3Body;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use futures_util::StreamExt;

use crate::{ByteStream, ObjectStore, ProgressFn, SinkError, SinkResult, StoredObject};

/// S3 floors non-final multipart parts at 5 MiB; smaller block hints are clamped up
const MIN_PART_SIZE_BYTES: usize = 5 * 1024 * 1024;

/// Configuration for S3-compatible storage (AWS S3, MinIO, LocalStack, etc.)
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub endpoint_url: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub force_path_style: bool,
}

impl S3Config {
    /// Load configuration from environment variables.
    ///
    /// Requires `S3_BUCKET`, `AWS_ACCESS_KEY_ID` and `AWS_SECRET_ACCESS_KEY`;
    /// honors `S3_REGION` (falling back to `AWS_REGION`, then `us-east-1`),
    /// `S3_ENDPOINT` and `S3_FORCE_PATH_STYLE`.
    pub fn from_env() -> SinkResult<Self> {
        let required = |name: &str| {
            std::env::var(name)
                .map_err(|_| SinkError::invalid(format!("missing environment variable {name}")))
        };

        Ok(Self {
            bucket: required("S3_BUCKET")?,
            region: std::env::var("S3_REGION")
                .or_else(|_| std::env::var("AWS_REGION"))
                .unwrap_or_else(|_| "us-east-1".to_string()),
            endpoint_url: std::env::var("S3_ENDPOINT").ok(),
            access_key_id: required("AWS_ACCESS_KEY_ID")?,
            secret_access_key: required("AWS_SECRET_ACCESS_KEY")?,
            force_path_style: std::env::var("S3_FORCE_PATH_STYLE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        })
    }
}

/// S3-compatible object store.
///
/// Paths passed to `put_stream` are object keys within the configured
/// bucket. Bodies larger than one transfer block go through a multipart
/// upload that is aborted on failure, so no orphaned part sets accumulate;
/// bodies that fit a single block use a plain `PutObject`.
pub struct S3CompatibleStore {
    client: Client,
    bucket: String,
}

impl S3CompatibleStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a store from `S3Config` environment variables
    pub fn from_env() -> SinkResult<Self> {
        Ok(Self::from_config(S3Config::from_env()?))
    }

    /// Build a store from explicit configuration (static credentials)
    pub fn from_config(config: S3Config) -> Self {
        let credentials = Credentials::new(
            config.access_key_id,
            config.secret_access_key,
            None,
            None,
            "blobsink",
        );
        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(config.force_path_style);
        if let Some(endpoint_url) = config.endpoint_url {
            builder = builder.endpoint_url(endpoint_url);
        }

        Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket,
        }
    }

    /// Build a store from the ambient AWS environment (credential chain, region)
    pub async fn from_aws_env(bucket: impl Into<String>) -> Self {
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self {
            client: Client::new(&sdk_config),
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3CompatibleStore {
    async fn put_stream(
        &self,
        path: &str,
        stream: ByteStream,
        block_size: u64,
        progress: ProgressFn,
    ) -> SinkResult<StoredObject> {
        let part_size = (block_size as usize).max(MIN_PART_SIZE_BYTES);
        let mut upload = StreamingUpload {
            store: self,
            key: path,
            part_size,
            progress,
            buffer: Vec::with_capacity(part_size),
            multipart: None,
            sent: 0,
        };

        match upload.drive(stream).await {
            Ok(stored) => Ok(stored),
            Err(err) => {
                upload.abort().await;
                Err(err)
            }
        }
    }
}

struct MultipartState {
    upload_id: String,
    parts: Vec<CompletedPart>,
    next_part: i32,
}

struct StreamingUpload<'a> {
    store: &'a S3CompatibleStore,
    key: &'a str,
    part_size: usize,
    progress: ProgressFn,
    buffer: Vec<u8>,
    multipart: Option<MultipartState>,
    sent: u64,
}

impl StreamingUpload<'_> {
    async fn drive(&mut self, mut stream: ByteStream) -> SinkResult<StoredObject> {
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            self.buffer.extend_from_slice(&chunk);
            while self.buffer.len() >= self.part_size {
                self.flush_part().await?;
            }
        }
        self.finish().await
    }

    async fn flush_part(&mut self) -> SinkResult<()> {
        if self.multipart.is_none() {
            let created = self
                .store
                .client
                .create_multipart_upload()
                .bucket(&self.store.bucket)
                .key(self.key)
                .send()
                .await
                .map_err(SinkError::backend)?;
            let upload_id = created
                .upload_id()
                .ok_or_else(|| SinkError::upload_failed("multipart upload id missing"))?
                .to_string();
            self.multipart = Some(MultipartState {
                upload_id,
                parts: Vec::new(),
                next_part: 1,
            });
        }
        let (upload_id, part_number) = match &self.multipart {
            Some(state) => (state.upload_id.clone(), state.next_part),
            None => return Err(SinkError::upload_failed("multipart state missing")),
        };

        // Take one part worth of bytes, keeping any overflow buffered
        let body = if self.buffer.len() > self.part_size {
            let rest = self.buffer.split_off(self.part_size);
            std::mem::replace(&mut self.buffer, rest)
        } else {
            std::mem::take(&mut self.buffer)
        };
        let body_len = body.len() as u64;

        let uploaded = self
            .store
            .client
            .upload_part()
            .bucket(&self.store.bucket)
            .key(self.key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(S3Body::from(body))
            .send()
            .await
            .map_err(SinkError::backend)?;

        if let Some(state) = self.multipart.as_mut() {
            state.parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .e_tag(uploaded.e_tag().unwrap_or_default())
                    .build(),
            );
            state.next_part += 1;
        }

        self.sent += body_len;
        (self.progress)(self.sent);
        Ok(())
    }

    async fn finish(&mut self) -> SinkResult<StoredObject> {
        if self.multipart.is_some() && !self.buffer.is_empty() {
            self.flush_part().await?;
        }

        match &self.multipart {
            // Everything fit into one block: single-shot PutObject
            None => {
                let body = std::mem::take(&mut self.buffer);
                let size_bytes = body.len() as u64;
                let output = self
                    .store
                    .client
                    .put_object()
                    .bucket(&self.store.bucket)
                    .key(self.key)
                    .body(S3Body::from(body))
                    .send()
                    .await
                    .map_err(SinkError::backend)?;

                self.sent = size_bytes;
                (self.progress)(self.sent);
                Ok(StoredObject {
                    path: self.key.to_string(),
                    size_bytes,
                    etag: output.e_tag().map(str::to_string),
                })
            }
            Some(state) => {
                let completed = CompletedMultipartUpload::builder()
                    .set_parts(Some(state.parts.clone()))
                    .build();
                let output = self
                    .store
                    .client
                    .complete_multipart_upload()
                    .bucket(&self.store.bucket)
                    .key(self.key)
                    .upload_id(&state.upload_id)
                    .multipart_upload(completed)
                    .send()
                    .await
                    .map_err(SinkError::backend)?;

                Ok(StoredObject {
                    path: self.key.to_string(),
                    size_bytes: self.sent,
                    etag: output.e_tag().map(str::to_string),
                })
            }
        }
    }

    /// Best-effort cleanup of a failed multipart upload
    async fn abort(&mut self) {
        if let Some(state) = self.multipart.take() {
            let _ = self
                .store
                .client
                .abort_multipart_upload()
                .bucket(&self.store.bucket)
                .key(self.key)
                .upload_id(&state.upload_id)
                .send()
                .await;
        }
    }
}
