use std::{collections::BTreeMap, num::NonZeroU32};

use prism_model::Tier;
use thiserror::Error;

pub const DEFAULT_LARGE_EDGE: u32 = 1600;
pub const DEFAULT_MEDIUM_EDGE: u32 = 800;
pub const DEFAULT_THUMB_EDGE: u32 = 200;
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error(
        "tier thresholds must strictly decrease (large {large} > medium {medium} > thumb {thumb})"
    )]
    NotDecreasing { large: u32, medium: u32, thumb: u32 },

    #[error("JPEG quality must be within 1..=100, got {0}")]
    Quality(u8),
}

/// Long-edge threshold per tier plus output encoding settings.
///
/// Thresholds are positive and strictly decreasing from `large` to `thumb`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizingPolicy {
    thresholds: BTreeMap<Tier, NonZeroU32>,
    jpeg_quality: u8,
}

impl SizingPolicy {
    pub fn new(
        large: NonZeroU32,
        medium: NonZeroU32,
        thumb: NonZeroU32,
        jpeg_quality: u8,
    ) -> Result<Self, PolicyError> {
        if !(large > medium && medium > thumb) {
            return Err(PolicyError::NotDecreasing {
                large: large.get(),
                medium: medium.get(),
                thumb: thumb.get(),
            });
        }
        if !(1..=100).contains(&jpeg_quality) {
            return Err(PolicyError::Quality(jpeg_quality));
        }

        let thresholds = BTreeMap::from([
            (Tier::Large, large),
            (Tier::Medium, medium),
            (Tier::Thumb, thumb),
        ]);
        Ok(Self {
            thresholds,
            jpeg_quality,
        })
    }

    /// Copy of this policy with one tier's threshold replaced.
    pub fn with_threshold(
        &self,
        tier: Tier,
        edge: NonZeroU32,
    ) -> Result<Self, PolicyError> {
        let mut next = self.thresholds.clone();
        next.insert(tier, edge);
        Self::new(
            next[&Tier::Large],
            next[&Tier::Medium],
            next[&Tier::Thumb],
            self.jpeg_quality,
        )
    }

    pub fn threshold(&self, tier: Tier) -> NonZeroU32 {
        self.thresholds
            .get(&tier)
            .copied()
            .unwrap_or(NonZeroU32::MIN)
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }
}

impl Default for SizingPolicy {
    fn default() -> Self {
        let edge = |v: u32| NonZeroU32::new(v).unwrap_or(NonZeroU32::MIN);
        Self {
            thresholds: BTreeMap::from([
                (Tier::Large, edge(DEFAULT_LARGE_EDGE)),
                (Tier::Medium, edge(DEFAULT_MEDIUM_EDGE)),
                (Tier::Thumb, edge(DEFAULT_THUMB_EDGE)),
            ]),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}
