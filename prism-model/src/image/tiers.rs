use std::{fmt, str::FromStr};

use crate::error::ModelError;

/// Named target size class for a derived image.
///
/// Ordering follows generation priority: `Large` first, `Thumb` last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Tier {
    Large,
    Medium,
    Thumb,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Large, Tier::Medium, Tier::Thumb];

    pub const fn as_str(self) -> &'static str {
        match self {
            Tier::Large => "large",
            Tier::Medium => "medium",
            Tier::Thumb => "thumb",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "large" => Ok(Tier::Large),
            "medium" => Ok(Tier::Medium),
            "thumb" | "thumbnail" => Ok(Tier::Thumb),
            other => Err(ModelError::UnknownTier(other.to_string())),
        }
    }
}
