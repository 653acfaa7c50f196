use std::collections::BTreeMap;

use crate::{
    image::{ImageDimensions, Tier},
    media::BlobPath,
};

/// Location and measured size of one derived variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VariantRef {
    pub path: BlobPath,
    pub dimensions: ImageDimensions,
}

impl VariantRef {
    pub fn new(path: BlobPath, dimensions: ImageDimensions) -> Self {
        Self { path, dimensions }
    }
}

/// Per-tier variant references of a record. A missing key means the tier is
/// absent (original too small, or derivation unsupported).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct VariantSet(BTreeMap<Tier, VariantRef>);

impl VariantSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tier: Tier) -> Option<&VariantRef> {
        self.0.get(&tier)
    }

    pub fn insert(&mut self, tier: Tier, variant: VariantRef) -> Option<VariantRef> {
        self.0.insert(tier, variant)
    }

    pub fn contains(&self, tier: Tier) -> bool {
        self.0.contains_key(&tier)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Present tiers in priority order.
    pub fn iter(&self) -> impl Iterator<Item = (Tier, &VariantRef)> {
        self.0.iter().map(|(tier, variant)| (*tier, variant))
    }

    pub fn paths(&self) -> impl Iterator<Item = &BlobPath> {
        self.0.values().map(|variant| &variant.path)
    }

    /// Tier to dimensions, used to compare variant sets without paths.
    pub fn dimension_map(&self) -> BTreeMap<Tier, ImageDimensions> {
        self.0
            .iter()
            .map(|(tier, variant)| (*tier, variant.dimensions))
            .collect()
    }
}

impl FromIterator<(Tier, VariantRef)> for VariantSet {
    fn from_iter<I: IntoIterator<Item = (Tier, VariantRef)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for VariantSet {
    type Item = (Tier, VariantRef);
    type IntoIter = std::collections::btree_map::IntoIter<Tier, VariantRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
