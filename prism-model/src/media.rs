use std::fmt;

use chrono::{DateTime, Utc};

use crate::{
    ids::MediaId,
    image::{ImageDimensions, Tier, VariantSet},
};

/// Path of a blob inside the blob store, relative to its root.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct BlobPath(String);

impl BlobPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Location of the unmodified upload for a record.
    pub fn original_for(id: MediaId, extension: &str) -> Self {
        Self(format!("originals/{}.{extension}", id.as_uuid().simple()))
    }

    /// Location of a derived variant. The path is a function of the sizing
    /// outcome, so regenerating under an unchanged policy yields the same
    /// path while a policy change yields a new one.
    pub fn variant_for(
        id: MediaId,
        tier: Tier,
        dimensions: ImageDimensions,
        extension: &str,
    ) -> Self {
        Self(format!(
            "variants/{}/{}-{}.{extension}",
            id.as_uuid().simple(),
            tier,
            dimensions
        ))
    }
}

impl fmt::Debug for BlobPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BlobPath").field(&self.0).finish()
    }
}

impl fmt::Display for BlobPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BlobPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Durable media entity: an original upload plus its derived variants.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MediaRecord {
    pub id: MediaId,
    pub filename: String,
    pub mime_type: String,
    pub original_ref: BlobPath,
    /// `None` until first successful measurement.
    pub dimensions: Option<ImageDimensions>,
    pub variants: VariantSet,
    pub created_at: DateTime<Utc>,
}

impl MediaRecord {
    pub fn has_dimensions(&self) -> bool {
        self.dimensions.is_some()
    }

    /// Every blob this record references: the original first, then variants
    /// in tier order.
    pub fn blob_paths(&self) -> Vec<BlobPath> {
        std::iter::once(self.original_ref.clone())
            .chain(self.variants.paths().cloned())
            .collect()
    }
}
