use anyhow::{Result, anyhow};
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use opendal::services::{Fs, Memory, S3};
use opendal::{ErrorKind, Operator, layers::RetryLayer};
use std::io::Error as IoError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Storage configuration
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub workspace: PathBuf,
}

#[derive(Clone, Debug)]
pub enum StorageBackend {
    Local,
    Memory,
    S3 {
        bucket: String,
        endpoint: Option<String>,
        region: Option<String>,
        access_key_id: String,
        secret_access_key: String,
    },
}

/// What the backend knows about an object before its body is read
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ObjectMeta {
    pub size: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
}

/// Read-only object access over an opendal operator
#[derive(Clone)]
pub struct StorageManager {
    operator: Operator,
    config: StorageConfig,
}

impl StorageManager {
    pub fn new(config: StorageConfig) -> Result<Self> {
        let operator = match &config.backend {
            StorageBackend::Local => build_fs_operator(&config.workspace)?,
            StorageBackend::Memory => build_memory_operator()?,
            StorageBackend::S3 {
                bucket,
                endpoint,
                region,
                access_key_id,
                secret_access_key,
            } => build_s3_operator(
                bucket,
                endpoint.as_deref(),
                region.as_deref(),
                access_key_id,
                secret_access_key,
            )?,
        };

        Ok(Self { operator, config })
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.config.backend, StorageBackend::S3 { .. })
    }

    /// Look an object up; `None` when the key does not name a stored file
    pub async fn stat(&self, key: &str) -> Result<Option<ObjectMeta>> {
        if key.is_empty() || key.ends_with('/') {
            return Ok(None);
        }

        let metadata = match self.operator.stat(key).await {
            Ok(metadata) => metadata,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                debug!(%key, "Object not found");
                return Ok(None);
            }
            Err(error) => return Err(error.into()),
        };

        if metadata.is_dir() {
            return Ok(None);
        }

        Ok(Some(ObjectMeta {
            size: metadata.content_length(),
            content_type: metadata.content_type().map(str::to_string),
            etag: metadata.etag().map(str::to_string),
        }))
    }

    /// Stream the inclusive byte range `start..=end` of an object
    pub async fn read_range(
        &self,
        key: &str,
        start: u64,
        end: u64,
    ) -> Result<BoxStream<'static, Result<Bytes, IoError>>> {
        if end < start {
            return Err(anyhow!("Invalid range {start}-{end} for {key}"));
        }

        // Chunks are fetched lazily; dropping the stream stops the read
        let stream = self
            .operator
            .reader_with(key)
            .chunk(CHUNK_SIZE)
            .await?
            .into_bytes_stream(start..=end)
            .await?;

        Ok(stream.boxed())
    }
}

fn build_fs_operator(root: &Path) -> Result<Operator> {
    info!(root = ?root, "Building filesystem operator");

    let mut builder = Fs::default();
    builder = builder.root(
        root.to_str()
            .ok_or_else(|| anyhow!("Invalid root path: {:?}", root))?,
    );

    Ok(Operator::new(builder)?
        .layer(RetryLayer::new().with_max_times(3))
        .finish())
}

fn build_memory_operator() -> Result<Operator> {
    info!("Building in-memory operator");
    Ok(Operator::new(Memory::default())?.finish())
}

fn build_s3_operator(
    bucket: &str,
    endpoint: Option<&str>,
    region: Option<&str>,
    access_key_id: &str,
    secret_access_key: &str,
) -> Result<Operator> {
    info!(
        bucket = %bucket,
        endpoint = ?endpoint,
        region = ?region,
        "Building S3 operator"
    );

    let mut builder = S3::default();
    builder = builder.bucket(bucket);
    builder = builder.access_key_id(access_key_id);
    builder = builder.secret_access_key(secret_access_key);

    if let Some(region) = region {
        builder = builder.region(region);
    }

    if let Some(endpoint) = endpoint {
        builder = builder.endpoint(endpoint);
    }

    Ok(Operator::new(builder)?
        .layer(RetryLayer::new().with_max_times(3))
        .finish())
}
