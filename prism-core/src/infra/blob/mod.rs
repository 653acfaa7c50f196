//! Blob storage infra.
//!
//! The pipeline only depends on [`BlobStore`]; the concrete backend is
//! selected at startup and passed in explicitly.

pub mod cache_store;
pub mod file_store;
pub mod memory_store;

pub use cache_store::*;
pub use file_store::*;
pub use memory_store::*;

use async_trait::async_trait;
use prism_model::BlobPath;

use crate::error::Result;

/// Byte storage addressed by path.
///
/// `read` returns `Ok(None)` for a missing blob, and `delete` of a missing
/// path succeeds; only genuine store failures surface as errors.
#[async_trait]
pub trait BlobStore: Send + Sync + std::fmt::Debug {
    async fn write(&self, path: &BlobPath, bytes: &[u8]) -> Result<()>;

    async fn read(&self, path: &BlobPath) -> Result<Option<Vec<u8>>>;

    async fn exists(&self, path: &BlobPath) -> Result<bool>;

    async fn delete(&self, path: &BlobPath) -> Result<()>;
}
