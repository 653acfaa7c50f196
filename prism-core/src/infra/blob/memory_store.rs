use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use prism_model::BlobPath;
use tokio::sync::RwLock;

use super::BlobStore;
use crate::error::Result;

/// In-process blob store. Clones share the same contents.
#[derive(Clone, Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<RwLock<BTreeMap<BlobPath, Vec<u8>>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }

    /// Snapshot of stored paths in lexical order.
    pub async fn paths(&self) -> Vec<BlobPath> {
        self.blobs.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn write(&self, path: &BlobPath, bytes: &[u8]) -> Result<()> {
        self.blobs.write().await.insert(path.clone(), bytes.to_vec());
        Ok(())
    }

    async fn read(&self, path: &BlobPath) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.read().await.get(path).cloned())
    }

    async fn exists(&self, path: &BlobPath) -> Result<bool> {
        Ok(self.blobs.read().await.contains_key(path))
    }

    async fn delete(&self, path: &BlobPath) -> Result<()> {
        self.blobs.write().await.remove(path);
        Ok(())
    }
}
