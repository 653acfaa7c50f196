use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use prism_model::{ImageDimensions, MediaId, MediaRecord, VariantSet};
use tokio::sync::RwLock;

use crate::{
    database::repository_ports::MediaRepository,
    error::{MediaError, Result},
};

/// In-process repository. Ids are UUIDv7, so key order is creation order.
#[derive(Clone, Debug, Default)]
pub struct InMemoryMediaRepository {
    records: Arc<RwLock<BTreeMap<MediaId, MediaRecord>>>,
}

impl InMemoryMediaRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl MediaRepository for InMemoryMediaRepository {
    async fn get(&self, id: MediaId) -> Result<Option<MediaRecord>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn list_missing_dimensions(&self) -> Result<Vec<MediaRecord>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|record| record.dimensions.is_none())
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<MediaRecord>> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn insert(&self, record: &MediaRecord) -> Result<()> {
        let mut guard = self.records.write().await;
        if guard.contains_key(&record.id) {
            return Err(MediaError::RepositoryWrite(format!(
                "media {} already exists",
                record.id
            )));
        }
        guard.insert(record.id, record.clone());
        Ok(())
    }

    async fn update_dimensions(
        &self,
        id: MediaId,
        dimensions: ImageDimensions,
    ) -> Result<()> {
        let mut guard = self.records.write().await;
        let record = guard
            .get_mut(&id)
            .ok_or_else(|| MediaError::NotFound(id.to_string()))?;
        record.dimensions = Some(dimensions);
        Ok(())
    }

    async fn replace_variants(
        &self,
        id: MediaId,
        variants: &VariantSet,
        dimensions: ImageDimensions,
    ) -> Result<()> {
        let mut guard = self.records.write().await;
        let record = guard
            .get_mut(&id)
            .ok_or_else(|| MediaError::NotFound(id.to_string()))?;
        record.variants = variants.clone();
        record.dimensions = Some(dimensions);
        Ok(())
    }

    async fn delete(&self, id: MediaId) -> Result<bool> {
        Ok(self.records.write().await.remove(&id).is_some())
    }
}
