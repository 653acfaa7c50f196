use async_trait::async_trait;
use prism_model::{ImageDimensions, MediaId, MediaRecord, VariantSet};

use crate::error::Result;

/// Repository port for media records and their per-tier variants.
///
/// Writes addressing a record that does not exist fail with
/// `MediaError::NotFound`. Listings are snapshots ordered by creation time.
#[async_trait]
pub trait MediaRepository: Send + Sync {
    async fn get(&self, id: MediaId) -> Result<Option<MediaRecord>>;

    /// Records whose original dimensions are unknown.
    async fn list_missing_dimensions(&self) -> Result<Vec<MediaRecord>>;

    async fn list_all(&self) -> Result<Vec<MediaRecord>>;

    /// Persist a fully processed record. Used by ingestion only.
    async fn insert(&self, record: &MediaRecord) -> Result<()>;

    async fn update_dimensions(
        &self,
        id: MediaId,
        dimensions: ImageDimensions,
    ) -> Result<()>;

    /// Replace every variant entry and the original dimensions in one
    /// logical update.
    async fn replace_variants(
        &self,
        id: MediaId,
        variants: &VariantSet,
        dimensions: ImageDimensions,
    ) -> Result<()>;

    /// Returns `false` when no record with `id` existed.
    async fn delete(&self, id: MediaId) -> Result<bool>;
}
