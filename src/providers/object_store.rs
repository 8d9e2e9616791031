//! Object store gateway for raw document bytes

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Trait for fetching uploaded file bytes by key
///
/// Implementations:
/// - `FsObjectStore`: local filesystem layout `root/bucket/key`
/// - a cloud blob store in production deployments
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch raw bytes; a missing object fails with [`Error::NotFound`]
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    /// Check if the provider is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Filesystem-backed object store
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Create a store rooted at the given directory
    pub fn new(root: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key)
    }

    /// Write an object (used by upload handling and tests)
    pub async fn put(&self, bucket: &str, key: &str, data: &[u8]) -> Result<()> {
        let path = self.object_path(bucket, key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, data).await?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let path = self.object_path(bucket, key);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::not_found(format!(
                "object {bucket}/{key} does not exist"
            ))),
            Err(e) => Err(Error::dependency(
                "object-store",
                format!("read {bucket}/{key}: {e}"),
            )),
        }
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.root.exists())
    }

    fn name(&self) -> &str {
        "fs-object-store"
    }
}
