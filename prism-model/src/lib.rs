//! Core data model definitions shared across Prism crates.
#![allow(missing_docs)]

pub use ::chrono;

pub mod error;
pub mod ids;
pub mod image;
pub mod media;

pub use error::{ModelError, Result as ModelResult};
pub use ids::MediaId;
pub use image::{
    ImageDimensions, ImageDimensionsError, Tier, VariantRef, VariantSet,
};
pub use media::{BlobPath, MediaRecord};
