use std::fmt::{self, Display};

/// Errors produced by model constructors and validation routines.
///
/// Dimension validation has its own
/// [`ImageDimensionsError`](crate::ImageDimensionsError).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    UnknownTier(String),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::UnknownTier(name) => write!(f, "unknown tier: {name}"),
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;
