//! Image Compression
//!
//! Shrinks pictures before upload so listing images stay small enough for cheap
//! storage and quick loading on rural connections.
//!
//! The loop is bounded: scale to fit [`MAX_DIMENSION`], encode at
//! [`INITIAL_QUALITY`], step the quality down by [`QUALITY_STEP`] while the encoded
//! `data:` URL is over budget and the quality is above [`MIN_QUALITY`], then, if
//! still over budget, downscale once by [`FALLBACK_SCALE`] and encode once more at
//! [`INITIAL_QUALITY`]. Whatever comes out of that last pass is returned.

use image::{DynamicImage, ImageError, RgbImage, codecs::jpeg::JpegEncoder, imageops::FilterType};
use thiserror::Error;

use crate::data_url::{self, DataUrl, DataUrlError};

/// Largest allowed width or height after the first resize.
pub const MAX_DIMENSION: u32 = 300;

/// Default budget for the encoded image, in KiB of binary data.
pub const DEFAULT_TARGET_KB: usize = 45;

/// JPEG quality of the first encoding pass.
pub const INITIAL_QUALITY: u8 = 50;

/// Quality dropped between passes.
pub const QUALITY_STEP: u8 = 10;

/// Quality floor of the stepping passes.
pub const MIN_QUALITY: u8 = 10;

/// Extra downscale applied once when quality reduction alone is not enough,
/// as `(numerator, denominator)`.
pub const FALLBACK_SCALE: (u32, u32) = (7, 10);

/// Base64 overhead applied to the budget, in percent.
const BASE64_OVERHEAD_PERCENT: usize = 133;

const JPEG_MIME: &str = "image/jpeg";

/// Errors raised while compressing.
#[derive(Debug, Error)]
pub enum CompressionError {
    #[error("could not decode image")]
    Decode(#[source] ImageError),

    #[error("could not encode image")]
    Encode(#[source] ImageError),

    #[error("invalid data URL")]
    DataUrl(#[from] DataUrlError),
}

/// Compression settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionOptions {
    /// Budget in KiB of binary image data.
    pub target_kb: usize,

    /// Largest allowed width or height.
    pub max_dimension: u32,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            target_kb: DEFAULT_TARGET_KB,
            max_dimension: MAX_DIMENSION,
        }
    }
}

impl CompressionOptions {
    /// Budget expressed as a maximum `data:` URL length.
    #[must_use]
    pub const fn budget(&self) -> usize {
        self.target_kb * 1024 * BASE64_OVERHEAD_PERCENT / 100
    }
}

/// A compressed JPEG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedImage {
    /// Encoded bytes.
    pub jpeg: Vec<u8>,

    /// Width in pixels.
    pub width: u32,

    /// Height in pixels.
    pub height: u32,

    /// Quality of the final encoding pass.
    pub quality: u8,

    /// Whether the result fits the budget. `false` means best effort.
    pub within_budget: bool,
}

impl CompressedImage {
    /// Length of this image as a `data:` URL.
    #[must_use]
    pub fn data_url_len(&self) -> usize {
        data_url::encoded_len(JPEG_MIME, self.jpeg.len())
    }

    /// Encode as a `data:image/jpeg;base64,` URL.
    #[must_use]
    pub fn to_data_url(&self) -> String {
        data_url::encode(JPEG_MIME, &self.jpeg)
    }
}

/// Compress encoded image bytes (any supported format) to a JPEG within budget.
///
/// # Errors
///
/// Returns [`CompressionError::Decode`] when the input is not a readable image.
pub fn compress_image(
    bytes: &[u8],
    options: &CompressionOptions,
) -> Result<CompressedImage, CompressionError> {
    let decoded = image::load_from_memory(bytes).map_err(CompressionError::Decode)?;
    let budget = options.budget();
    let fits = |jpeg: &[u8]| data_url::encoded_len(JPEG_MIME, jpeg.len()) <= budget;

    let (width, height) = fit_within(decoded.width(), decoded.height(), options.max_dimension);
    let pixels = resize(&decoded, width, height);

    let mut quality = INITIAL_QUALITY;
    let mut jpeg = encode_jpeg(&pixels, quality)?;

    while !fits(&jpeg) && quality > MIN_QUALITY {
        quality = quality.saturating_sub(QUALITY_STEP).max(MIN_QUALITY);
        jpeg = encode_jpeg(&pixels, quality)?;
    }

    if fits(&jpeg) {
        return Ok(CompressedImage {
            jpeg,
            width,
            height,
            quality,
            within_budget: true,
        });
    }

    let (width, height) = scale(width, height, FALLBACK_SCALE);
    let pixels = resize(&decoded, width, height);
    let quality = INITIAL_QUALITY;
    let jpeg = encode_jpeg(&pixels, quality)?;

    Ok(CompressedImage {
        within_budget: fits(&jpeg),
        jpeg,
        width,
        height,
        quality,
    })
}

/// Compress an image given as a `data:` URL, returning a JPEG `data:` URL.
///
/// # Errors
///
/// Returns an error when the URL is malformed or its payload is not a readable image.
pub fn compress_data_url(
    url: &str,
    options: &CompressionOptions,
) -> Result<String, CompressionError> {
    let parsed = DataUrl::parse(url)?;

    compress_image(parsed.bytes(), options).map(|image| image.to_data_url())
}

/// Like [`compress_data_url`], but hands back the original URL when it cannot be
/// compressed.
#[must_use]
pub fn compress_data_url_or_original(url: &str, options: &CompressionOptions) -> String {
    compress_data_url(url, options).unwrap_or_else(|_original| url.to_string())
}

/// Proportionally scale `(width, height)` so neither side exceeds `max`.
#[must_use]
pub fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    let shrink = |long: u32, short: u32| -> u32 {
        let scaled = u64::from(short) * u64::from(max) / u64::from(long.max(1));

        u32::try_from(scaled).unwrap_or(max).max(1)
    };

    if width > height {
        if width > max {
            return (max, shrink(width, height));
        }
    } else if height > max {
        return (shrink(height, width), max);
    }

    (width.max(1), height.max(1))
}

fn scale(width: u32, height: u32, (numerator, denominator): (u32, u32)) -> (u32, u32) {
    let apply = |side: u32| -> u32 {
        let scaled = u64::from(side) * u64::from(numerator) / u64::from(denominator.max(1));

        u32::try_from(scaled).unwrap_or(side).max(1)
    };

    (apply(width), apply(height))
}

fn resize(image: &DynamicImage, width: u32, height: u32) -> RgbImage {
    if image.width() == width && image.height() == height {
        image.to_rgb8()
    } else {
        image
            .resize_exact(width, height, FilterType::Triangle)
            .to_rgb8()
    }
}

fn encode_jpeg(pixels: &RgbImage, quality: u8) -> Result<Vec<u8>, CompressionError> {
    let mut jpeg = Vec::new();

    JpegEncoder::new_with_quality(&mut jpeg, quality)
        .encode_image(pixels)
        .map_err(CompressionError::Encode)?;

    Ok(jpeg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landscape_is_bounded_by_width() {
        assert_eq!(fit_within(1200, 600, 300), (300, 150));
    }

    #[test]
    fn portrait_is_bounded_by_height() {
        assert_eq!(fit_within(400, 1200, 300), (100, 300));
    }

    #[test]
    fn square_and_small_images_keep_size() {
        assert_eq!(fit_within(900, 900, 300), (300, 300));
        assert_eq!(fit_within(120, 80, 300), (120, 80));
    }

    #[test]
    fn extreme_aspect_ratio_never_collapses_to_zero() {
        assert_eq!(fit_within(10_000, 2, 300), (300, 1));
    }

    #[test]
    fn fallback_scale_truncates() {
        assert_eq!(scale(300, 225, FALLBACK_SCALE), (210, 157));
    }

    #[test]
    fn budget_includes_base64_overhead() {
        let options = CompressionOptions::default();

        assert_eq!(options.budget(), 45 * 1024 * 133 / 100);
    }
}
