use std::{
    fmt,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use prism_model::BlobPath;
use tracing::{debug, warn};

use super::BlobStore;
use crate::error::{MediaError, Result};

/// Root directory for the `cacache` blob store.
///
/// `cacache` manages the directory internally (index + content-addressed
/// data); blob paths are used as index keys.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BlobCacheRoot(PathBuf);

impl BlobCacheRoot {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Debug for BlobCacheRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BlobCacheRoot").field(&self.0).finish()
    }
}

/// Integrity-checked blob store over `cacache`.
///
/// Content is shared between keys with identical bytes. Deleting a key drops
/// its index entry and frees the content once no other key points at it.
#[derive(Clone, Debug)]
pub struct CacacheBlobStore {
    root: BlobCacheRoot,
}

impl CacacheBlobStore {
    pub fn new(root: BlobCacheRoot) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &BlobCacheRoot {
        &self.root
    }
}

fn map_cacache_error(path: &BlobPath, err: cacache::Error) -> MediaError {
    match err {
        cacache::Error::EntryNotFound(_, _) => {
            MediaError::MissingSource(path.to_string())
        }
        cacache::Error::IntegrityError(err) => MediaError::storage(
            path.as_str(),
            format!("blob failed integrity check ({err})"),
        ),
        cacache::Error::SizeMismatch(wanted, actual) => MediaError::storage(
            path.as_str(),
            format!("blob size mismatch: wanted={wanted}, actual={actual}"),
        ),
        cacache::Error::IoError(_, msg) => {
            MediaError::storage(path.as_str(), format!("cacache I/O error: {msg}"))
        }
        cacache::Error::SerdeError(_, msg) => MediaError::storage(
            path.as_str(),
            format!("cacache serde error: {msg}"),
        ),
    }
}

#[async_trait]
impl BlobStore for CacacheBlobStore {
    async fn write(&self, path: &BlobPath, bytes: &[u8]) -> Result<()> {
        let replaced = self.entry(path).await?;
        let integrity =
            cacache::write(self.root.as_path(), path.as_str(), bytes)
                .await
                .map_err(|e| map_cacache_error(path, e))?;
        debug!(path = %path, %integrity, bytes = bytes.len(), "blob written");

        if let Some(previous) = replaced
            && previous.integrity != integrity
            && let Err(err) =
                self.release_content(path, &previous.integrity).await
        {
            warn!(path = %path, "replaced blob content left behind: {err}");
        }
        Ok(())
    }

    async fn read(&self, path: &BlobPath) -> Result<Option<Vec<u8>>> {
        match cacache::read(self.root.as_path(), path.as_str()).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(cacache::Error::EntryNotFound(_, _)) => Ok(None),
            Err(err) => Err(map_cacache_error(path, err)),
        }
    }

    async fn exists(&self, path: &BlobPath) -> Result<bool> {
        Ok(self.entry(path).await?.is_some())
    }

    async fn delete(&self, path: &BlobPath) -> Result<()> {
        let Some(entry) = self.entry(path).await? else {
            return Ok(());
        };
        cacache::remove(self.root.as_path(), path.as_str())
            .await
            .map_err(|e| map_cacache_error(path, e))?;
        self.release_content(path, &entry.integrity).await?;
        debug!(path = %path, bytes = entry.size, "blob deleted");
        Ok(())
    }
}

impl CacacheBlobStore {
    async fn entry(&self, path: &BlobPath) -> Result<Option<cacache::Metadata>> {
        cacache::metadata(self.root.as_path(), path.as_str())
            .await
            .map_err(|e| map_cacache_error(path, e))
    }

    /// Remove the content behind `integrity` unless a key other than `path`
    /// still indexes it. An unreadable index entry counts as a reference.
    async fn release_content(
        &self,
        path: &BlobPath,
        integrity: &cacache::Integrity,
    ) -> Result<()> {
        let root = self.root.as_path().to_path_buf();
        let key = path.as_str().to_owned();
        let wanted = integrity.clone();
        let shared = tokio::task::spawn_blocking(move || {
            cacache::list_sync(&root).any(|listed| {
                listed.map_or(true, |other| {
                    other.key != key && other.integrity == wanted
                })
            })
        })
        .await
        .map_err(|err| {
            MediaError::Internal(format!("Failed to join cacache listing: {err}"))
        })?;
        if shared {
            debug!(path = %path, "content still referenced by another key");
            return Ok(());
        }

        match cacache::remove_hash(self.root.as_path(), integrity).await {
            Ok(()) => Ok(()),
            Err(cacache::Error::IoError(err, _))
                if err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(map_cacache_error(path, err)),
        }
    }
}
