use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use prism_model::BlobPath;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

use super::BlobStore;
use crate::error::{MediaError, Result};

/// File-backed blob store rooted at a single directory.
///
/// Blob paths map to relative file paths below `root`. Writes go through a
/// temp file and a rename so readers never observe a half-written blob.
#[derive(Clone, Debug)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_valid_path(path: &str) -> bool {
        !path.is_empty()
            && !path.ends_with('/')
            && Path::new(path)
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
    }

    pub fn path_for(&self, path: &BlobPath) -> Result<PathBuf> {
        if !Self::is_valid_path(path.as_str()) {
            return Err(MediaError::storage(
                path.as_str(),
                "invalid blob path",
            ));
        }
        Ok(self.root.join(path.as_str()))
    }

    pub async fn ensure_root(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|err| {
            MediaError::Internal(format!(
                "failed to create blob root {:?}: {err}",
                self.root
            ))
        })
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn write(&self, path: &BlobPath, bytes: &[u8]) -> Result<()> {
        let target = self.path_for(path)?;
        let parent = target.parent().unwrap_or(&self.root).to_path_buf();
        tokio::fs::create_dir_all(&parent)
            .await
            .map_err(|err| MediaError::storage(path.as_str(), err))?;

        let file_name = target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = parent
            .join(format!(".{file_name}.tmp-{}", Uuid::new_v4().simple()));

        let mut file = tokio::fs::File::create(&tmp).await.map_err(|err| {
            MediaError::storage(
                path.as_str(),
                format!("failed to create temp blob {tmp:?}: {err}"),
            )
        })?;
        let written = async {
            file.write_all(bytes).await?;
            file.flush().await?;
            file.sync_all().await
        }
        .await;
        drop(file);

        if let Err(err) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(MediaError::storage(
                path.as_str(),
                format!("failed to write temp blob {tmp:?}: {err}"),
            ));
        }

        if let Err(err) = tokio::fs::rename(&tmp, &target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(MediaError::storage(
                path.as_str(),
                format!("failed to move blob {tmp:?} -> {target:?}: {err}"),
            ));
        }

        debug!(path = %path, bytes = bytes.len(), "blob written");
        Ok(())
    }

    async fn read(&self, path: &BlobPath) -> Result<Option<Vec<u8>>> {
        let target = self.path_for(path)?;
        match tokio::fs::read(&target).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(MediaError::storage(path.as_str(), err)),
        }
    }

    async fn exists(&self, path: &BlobPath) -> Result<bool> {
        let target = self.path_for(path)?;
        tokio::fs::try_exists(&target)
            .await
            .map_err(|err| MediaError::storage(path.as_str(), err))
    }

    async fn delete(&self, path: &BlobPath) -> Result<()> {
        let target = self.path_for(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => {
                debug!(path = %path, "blob deleted");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(MediaError::storage(path.as_str(), err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_paths_escaping_the_root() {
        assert!(FsBlobStore::is_valid_path("variants/abc/large-10x10.jpg"));
        assert!(!FsBlobStore::is_valid_path("../etc/passwd"));
        assert!(!FsBlobStore::is_valid_path("/etc/passwd"));
        assert!(!FsBlobStore::is_valid_path("a/./b"));
        assert!(!FsBlobStore::is_valid_path("a/"));
        assert!(!FsBlobStore::is_valid_path(""));
    }

    #[tokio::test]
    async fn write_read_overwrite_delete() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsBlobStore::new(dir.path().to_path_buf());
        let path = BlobPath::new("originals/one.png");

        assert_eq!(store.read(&path).await.unwrap(), None);
        assert!(!store.exists(&path).await.unwrap());

        store.write(&path, b"first").await.unwrap();
        store.write(&path, b"second").await.unwrap();
        assert!(store.exists(&path).await.unwrap());
        assert_eq!(store.read(&path).await.unwrap(), Some(b"second".to_vec()));

        store.delete(&path).await.unwrap();
        assert!(!store.exists(&path).await.unwrap());
        // Deleting again is not an error.
        store.delete(&path).await.unwrap();
    }

    #[tokio::test]
    async fn leaves_no_temp_files_behind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsBlobStore::new(dir.path().to_path_buf());
        store
            .write(&BlobPath::new("variants/x/thumb-2x2.png"), b"px")
            .await
            .unwrap();

        let mut entries =
            std::fs::read_dir(dir.path().join("variants/x")).unwrap();
        let only = entries.next().unwrap().unwrap();
        assert_eq!(only.file_name(), "thumb-2x2.png");
        assert!(entries.next().is_none());
    }

    #[tokio::test]
    async fn invalid_paths_are_storage_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsBlobStore::new(dir.path().to_path_buf());
        let err = store
            .write(&BlobPath::new("../outside"), b"x")
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Storage { .. }));
    }
}
