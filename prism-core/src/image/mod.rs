//! Decoding, sizing and encoding of derived variants.

pub mod generator;
pub mod policy;

pub use generator::{
    EncodedVariant, GeneratedImage, OutputFormat, PlannedVariant, TierFailure,
    VariantGenerator,
};
pub use policy::{PolicyError, SizingPolicy};
