use std::str::FromStr;

use uuid::Uuid;

/// Strongly typed id for media records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct MediaId(pub Uuid);

impl Default for MediaId {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaId {
    pub fn new() -> Self {
        MediaId(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn to_uuid(&self) -> Uuid {
        self.0
    }
}

impl AsRef<Uuid> for MediaId {
    fn as_ref(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for MediaId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for MediaId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(MediaId)
    }
}

impl std::fmt::Display for MediaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
