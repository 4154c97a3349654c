use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::primitives::ByteStream;
use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid storage key {0:?}")]
    InvalidKey(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("object store error: {0}")]
    Remote(String),
}

// 1. MediaStore Contract
/// MediaStore
///
/// The abstract contract for where uploaded bytes live. Handlers never know whether objects
/// land on local disk, in an S3-compatible bucket, or in the in-memory mock used by tests.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Prepares the backend (creates the upload directory or bucket). Safe to repeat.
    async fn ensure_ready(&self) -> Result<(), StorageError>;

    /// Writes `bytes` under `key` and returns the public URL of the object.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str)
    -> Result<String, StorageError>;

    /// Removes the object. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// MediaStoreState
///
/// The concrete type used to share the media store across the application state.
pub type MediaStoreState = Arc<dyn MediaStore>;

/// sanitize_key
///
/// Drops empty, `.` and `..` segments so a key can never climb out of the store root.
pub fn sanitize_key(key: &str) -> String {
    key.split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

fn checked_key(key: &str) -> Result<String, StorageError> {
    let clean = sanitize_key(key);
    if clean.is_empty() {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(clean)
}

// 2. Local filesystem
/// LocalMediaStore
///
/// Writes objects below `root`; the router serves that directory at `/uploads`.
#[derive(Clone)]
pub struct LocalMediaStore {
    root: PathBuf,
    public_base: String,
}

impl LocalMediaStore {
    /// `public_base` is the URL prefix the directory is served under,
    /// e.g. `http://localhost:4000/uploads`.
    pub fn new(root: impl Into<PathBuf>, public_base: &str) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn ensure_ready(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        let key = checked_key(key)?;
        let path = self.root.join(&key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let len = bytes.len();
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!("stored {} bytes at {:?}", len, path);
        Ok(format!("{}/{}", self.public_base, key))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let key = checked_key(key)?;
        match tokio::fs::remove_file(self.root.join(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// 3. S3-compatible bucket
/// S3MediaStore
///
/// Stores objects through the AWS SDK. Works against AWS, MinIO and Supabase Storage;
/// `force_path_style(true)` is required for the latter two.
#[derive(Clone)]
pub struct S3MediaStore {
    client: s3::Client,
    bucket_name: String,
    public_url: String,
}

impl S3MediaStore {
    pub fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
        public_url: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            bucket_name: bucket.to_string(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl MediaStore for S3MediaStore {
    /// CreateBucket is idempotent for the owner; "already owned" responses are ignored.
    async fn ensure_ready(&self) -> Result<(), StorageError> {
        if let Err(e) = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            tracing::debug!("create_bucket {}: {:?}", self.bucket_name, e);
        }
        Ok(())
    }

    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let key = checked_key(key)?;
        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError::Remote(e.to_string()))?;
        Ok(format!("{}/{}", self.public_url, key))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let key = checked_key(key)?;
        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .send()
            .await
            .map_err(|e| StorageError::Remote(e.to_string()))?;
        Ok(())
    }
}

// 4. In-memory mock
/// MockMediaStore
///
/// Keeps objects in a map so tests can assert on what was written without touching disk
/// or network. `should_fail` makes every write fail.
#[derive(Clone, Default)]
pub struct MockMediaStore {
    pub should_fail: bool,
    objects: Arc<Mutex<HashMap<String, (String, Vec<u8>)>>>,
}

impl MockMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .lock()
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Content type and bytes stored under `key`.
    pub fn object(&self, key: &str) -> Option<(String, Vec<u8>)> {
        self.objects.lock().ok()?.get(key).cloned()
    }
}

#[async_trait]
impl MediaStore for MockMediaStore {
    async fn ensure_ready(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        if self.should_fail {
            return Err(StorageError::Remote("mock store failure".to_string()));
        }
        let key = checked_key(key)?;
        let url = format!("http://localhost:4000/uploads/{key}");
        if let Ok(mut objects) = self.objects.lock() {
            objects.insert(key, (content_type.to_string(), bytes));
        }
        Ok(url)
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        if let Ok(mut objects) = self.objects.lock() {
            objects.remove(&sanitize_key(key));
        }
        Ok(())
    }
}
