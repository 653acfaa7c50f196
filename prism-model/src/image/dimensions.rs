use std::{fmt, num::NonZeroU32};

/// Non-zero pixel dimensions for a decoded image.
///
/// Records either know both edges or neither, so "unknown" is modeled as
/// `Option<ImageDimensions>` at the use site rather than zero values here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImageDimensions {
    pub width: NonZeroU32,
    pub height: NonZeroU32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageDimensionsError {
    ZeroWidth,
    ZeroHeight,
}

impl fmt::Display for ImageDimensionsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageDimensionsError::ZeroWidth => f.write_str("width is zero"),
            ImageDimensionsError::ZeroHeight => f.write_str("height is zero"),
        }
    }
}

impl std::error::Error for ImageDimensionsError {}

impl ImageDimensions {
    pub const fn new(width: NonZeroU32, height: NonZeroU32) -> Self {
        Self { width, height }
    }

    pub const fn width_u32(self) -> u32 {
        self.width.get()
    }

    pub const fn height_u32(self) -> u32 {
        self.height.get()
    }

    pub const fn as_u32_tuple(self) -> (u32, u32) {
        (self.width.get(), self.height.get())
    }

    pub fn long_edge(self) -> u32 {
        self.width.get().max(self.height.get())
    }

    /// Scale so the long edge equals `max_edge`, preserving aspect ratio.
    ///
    /// Returns `None` when the image already fits (`long_edge <= max_edge`);
    /// images are never upscaled. The short edge is floored and clamped to
    /// at least one pixel.
    pub fn scaled_to_long_edge(self, max_edge: NonZeroU32) -> Option<Self> {
        let (w, h) = self.as_u32_tuple();
        let target = max_edge.get();
        if w.max(h) <= target {
            return None;
        }

        let scale_short = |short: u32, long: u32| -> NonZeroU32 {
            let scaled = (u64::from(short) * u64::from(target)) / u64::from(long);
            NonZeroU32::new(scaled as u32).unwrap_or(NonZeroU32::MIN)
        };

        Some(if w >= h {
            Self::new(max_edge, scale_short(h, w))
        } else {
            Self::new(scale_short(w, h), max_edge)
        })
    }
}

impl TryFrom<(u32, u32)> for ImageDimensions {
    type Error = ImageDimensionsError;

    fn try_from(value: (u32, u32)) -> Result<Self, Self::Error> {
        let (width, height) = value;
        let width =
            NonZeroU32::new(width).ok_or(ImageDimensionsError::ZeroWidth)?;
        let height =
            NonZeroU32::new(height).ok_or(ImageDimensionsError::ZeroHeight)?;
        Ok(Self { width, height })
    }
}

impl TryFrom<(i32, i32)> for ImageDimensions {
    type Error = ImageDimensionsError;

    fn try_from(value: (i32, i32)) -> Result<Self, Self::Error> {
        let (width, height) = value;
        let width = u32::try_from(width)
            .map_err(|_| ImageDimensionsError::ZeroWidth)?;
        let height = u32::try_from(height)
            .map_err(|_| ImageDimensionsError::ZeroHeight)?;
        Self::try_from((width, height))
    }
}

impl fmt::Display for ImageDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
