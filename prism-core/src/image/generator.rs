use std::io::Cursor;

use image::{
    DynamicImage, ImageFormat, ImageReader,
    codecs::{jpeg::JpegEncoder, png::PngEncoder},
    imageops::FilterType,
};
use prism_model::{
    BlobPath, ImageDimensions, MediaId, Tier, VariantRef, VariantSet,
};
use tracing::{debug, warn};

use crate::{
    error::{MediaError, Result},
    image::policy::SizingPolicy,
};

/// Encoding used for derived variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Jpeg,
}

impl OutputFormat {
    /// PNG sources keep PNG (transparency survives); everything else is
    /// re-encoded as JPEG.
    pub fn for_source(source: ImageFormat) -> Self {
        match source {
            ImageFormat::Png => OutputFormat::Png,
            _ => OutputFormat::Jpeg,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
        }
    }
}

/// One successfully encoded tier, ready to be written to its path.
#[derive(Debug, Clone)]
pub struct EncodedVariant {
    pub tier: Tier,
    pub variant: VariantRef,
    pub bytes: Vec<u8>,
}

/// A tier that should exist under the policy but could not be encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierFailure {
    pub tier: Tier,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct GeneratedImage {
    /// Measured size of the decoded original.
    pub original: ImageDimensions,
    pub source_format: ImageFormat,
    pub variants: Vec<EncodedVariant>,
    pub failures: Vec<TierFailure>,
}

impl GeneratedImage {
    /// Extension to store the unmodified upload under.
    pub fn original_extension(&self) -> &'static str {
        self.source_format
            .extensions_str()
            .first()
            .copied()
            .unwrap_or("bin")
    }

    pub fn variant_set(&self) -> VariantSet {
        self.variants
            .iter()
            .map(|encoded| (encoded.tier, encoded.variant.clone()))
            .collect()
    }
}

/// Planned output for one tier, before any pixels are touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedVariant {
    pub tier: Tier,
    pub dimensions: ImageDimensions,
}

/// Decodes originals and derives resized variants under a [`SizingPolicy`].
///
/// Stateless apart from the policy; never touches a store.
#[derive(Debug, Clone, Default)]
pub struct VariantGenerator {
    policy: SizingPolicy,
}

impl VariantGenerator {
    pub fn new(policy: SizingPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &SizingPolicy {
        &self.policy
    }

    /// Target dimensions per tier for an original of the given size, in tier
    /// priority order. Tiers the original already fits are omitted.
    pub fn plan(&self, original: ImageDimensions) -> Vec<PlannedVariant> {
        Tier::ALL
            .into_iter()
            .filter_map(|tier| {
                original
                    .scaled_to_long_edge(self.policy.threshold(tier))
                    .map(|dimensions| PlannedVariant { tier, dimensions })
            })
            .collect()
    }

    /// Decode `bytes`, measure them, and encode every applicable tier.
    ///
    /// Fails only when the original cannot be decoded. A tier that fails to
    /// encode is reported in [`GeneratedImage::failures`] and the remaining
    /// tiers are still produced.
    pub fn generate(
        &self,
        id: MediaId,
        bytes: &[u8],
        declared_mime: &str,
    ) -> Result<GeneratedImage> {
        let (image, source_format) = decode(bytes, declared_mime)?;
        let original =
            ImageDimensions::try_from((image.width(), image.height()))
                .map_err(|err| {
                    MediaError::Decode(format!("decoded image is empty: {err}"))
                })?;
        let output = OutputFormat::for_source(source_format);

        let mut variants = Vec::new();
        let mut failures = Vec::new();
        for planned in self.plan(original) {
            match self.encode(&image, planned.dimensions, output) {
                Ok(encoded) => {
                    let path = BlobPath::variant_for(
                        id,
                        planned.tier,
                        planned.dimensions,
                        output.extension(),
                    );
                    debug!(
                        media_id = %id,
                        tier = %planned.tier,
                        dimensions = %planned.dimensions,
                        bytes = encoded.len(),
                        "variant encoded"
                    );
                    variants.push(EncodedVariant {
                        tier: planned.tier,
                        variant: VariantRef::new(path, planned.dimensions),
                        bytes: encoded,
                    });
                }
                Err(err) => {
                    warn!(
                        media_id = %id,
                        tier = %planned.tier,
                        "variant encoding failed: {err}"
                    );
                    failures.push(TierFailure {
                        tier: planned.tier,
                        message: err.to_string(),
                    });
                }
            }
        }

        Ok(GeneratedImage {
            original,
            source_format,
            variants,
            failures,
        })
    }

    /// Dimensions of the original from its header, without decoding pixels.
    pub fn measure(
        &self,
        bytes: &[u8],
        declared_mime: &str,
    ) -> Result<ImageDimensions> {
        let declared = ImageFormat::from_mime_type(declared_mime).and_then(
            |format| {
                ImageReader::with_format(Cursor::new(bytes), format)
                    .into_dimensions()
                    .ok()
            },
        );
        let probed = match declared {
            Some(probed) => probed,
            None => ImageReader::new(Cursor::new(bytes))
                .with_guessed_format()?
                .into_dimensions()
                .map_err(|err| MediaError::Decode(err.to_string()))?,
        };

        ImageDimensions::try_from(probed).map_err(|err| {
            MediaError::Decode(format!(
                "image reports {}x{}: {err}",
                probed.0, probed.1
            ))
        })
    }

    fn encode(
        &self,
        image: &DynamicImage,
        target: ImageDimensions,
        output: OutputFormat,
    ) -> std::result::Result<Vec<u8>, image::ImageError> {
        let (width, height) = target.as_u32_tuple();
        let resized = image.resize_exact(width, height, FilterType::Lanczos3);

        let mut buf = Vec::new();
        match output {
            OutputFormat::Png => {
                resized.write_with_encoder(PngEncoder::new(&mut buf))?;
            }
            OutputFormat::Jpeg => {
                let rgb = resized.to_rgb8();
                let mut encoder = JpegEncoder::new_with_quality(
                    &mut buf,
                    self.policy.jpeg_quality(),
                );
                encoder.encode(
                    rgb.as_raw(),
                    width,
                    height,
                    image::ColorType::Rgb8.into(),
                )?;
            }
        }
        Ok(buf)
    }
}

/// The declared type picks the decoder; when it is unknown or does not match
/// the content, the format is sniffed from the bytes instead.
fn decode(bytes: &[u8], declared_mime: &str) -> Result<(DynamicImage, ImageFormat)> {
    if let Some(format) = ImageFormat::from_mime_type(declared_mime) {
        match ImageReader::with_format(Cursor::new(bytes), format).decode() {
            Ok(image) => return Ok((image, format)),
            Err(err) => debug!(
                declared_mime,
                "declared decoder failed, sniffing content: {err}"
            ),
        }
    }

    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    let format = reader.format().ok_or_else(|| {
        MediaError::Decode(format!(
            "unrecognized image content (declared {declared_mime})"
        ))
    })?;
    let image = reader
        .decode()
        .map_err(|err| MediaError::Decode(err.to_string()))?;
    Ok((image, format))
}
