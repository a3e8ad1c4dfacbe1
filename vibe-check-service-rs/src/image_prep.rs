//! Image normalisation before upload
//!
//! Produces a base64 JPEG bounded in bytes and dimensions. Heavier
//! recompression is applied the further the source is over the ceiling.
//! Preparation never fails: on any decode or encode error the original
//! bytes are returned re-encoded as base64 and marked `degraded`.

use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageError, Rgb, RgbImage};
use log::{debug, warn};

/// Quality used when the source is already under the ceiling
const LIGHT_QUALITY: u8 = 90;
const MIN_QUALITY: u8 = 60;
const QUALITY_STEP: u8 = 10;

/// Size and dimension bounds for prepared images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreprocessOptions {
    /// Target ceiling for the encoded JPEG
    pub max_bytes: usize,

    /// Cap on the long edge
    pub max_edge: u32,

    /// Square box the image is fitted into if capping the long edge was not enough
    pub fallback_box: u32,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            max_bytes: 2 * 1024 * 1024,
            max_edge: 1024,
            fallback_box: 800,
        }
    }
}

/// A prepared image ready to be sent as `imageBase64`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedImage {
    pub base64: String,

    /// Size of the encoded image in bytes
    pub byte_len: usize,

    pub width: u32,
    pub height: u32,

    /// JPEG quality used; 0 when degraded
    pub quality: u8,

    /// True when the original bytes were passed through unmodified
    pub degraded: bool,
}

impl PreparedImage {
    fn passthrough(bytes: &[u8]) -> Self {
        Self {
            base64: BASE64.encode(bytes),
            byte_len: bytes.len(),
            width: 0,
            height: 0,
            quality: 0,
            degraded: true,
        }
    }
}

/// Prepare an image stored on disk
pub fn prepare_image_file(path: &Path, options: &PreprocessOptions) -> PreparedImage {
    match fs::read(path) {
        Ok(bytes) => prepare_image_bytes(&bytes, options),
        Err(e) => {
            warn!("Could not read image {}: {}", path.display(), e);
            PreparedImage::passthrough(&[])
        }
    }
}

/// Prepare an image given as base64, with or without a `data:` URL prefix
pub fn prepare_image_base64(encoded: &str, options: &PreprocessOptions) -> PreparedImage {
    let payload: String = strip_data_url(encoded)
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    match BASE64.decode(payload.as_bytes()) {
        Ok(bytes) => prepare_image_bytes(&bytes, options),
        Err(e) => {
            warn!("Inbound image is not valid base64, passing it through: {}", e);
            PreparedImage {
                byte_len: estimated_decoded_len(&payload),
                base64: payload,
                ..PreparedImage::passthrough(&[])
            }
        }
    }
}

/// Prepare raw encoded image bytes (any format the `image` crate decodes)
pub fn prepare_image_bytes(bytes: &[u8], options: &PreprocessOptions) -> PreparedImage {
    match compress(bytes, options) {
        Ok(prepared) => {
            debug!(
                "Prepared image {}x{} at quality {}: {} -> {} bytes",
                prepared.width,
                prepared.height,
                prepared.quality,
                bytes.len(),
                prepared.byte_len
            );
            prepared
        }
        Err(e) => {
            warn!("Image preparation failed, using original bytes: {}", e);
            PreparedImage::passthrough(bytes)
        }
    }
}

/// Starting JPEG quality for a source `ratio` times over the ceiling
pub fn initial_quality(ratio: f64) -> u8 {
    if ratio > 4.0 {
        60
    } else if ratio > 2.0 {
        70
    } else if ratio > 1.5 {
        80
    } else {
        90
    }
}

/// Decoded size of a base64 payload, without decoding it
pub fn estimated_decoded_len(encoded: &str) -> usize {
    let payload = strip_data_url(encoded).trim();
    let padding = payload.bytes().rev().take_while(|b| *b == b'=').count();
    (payload.len() / 4 * 3 + payload.len() % 4 * 3 / 4).saturating_sub(padding)
}

/// Part of a `data:` URL after `base64,`; other input is returned as-is
pub fn strip_data_url(encoded: &str) -> &str {
    let trimmed = encoded.trim();
    if trimmed.starts_with("data:") {
        if let Some((_, payload)) = trimmed.split_once("base64,") {
            return payload;
        }
    }
    trimmed
}

fn compress(bytes: &[u8], options: &PreprocessOptions) -> Result<PreparedImage, ImageError> {
    let source = image::load_from_memory(bytes)?;
    let image = fit_within(flatten_alpha(&source), options.max_edge);

    if bytes.len() <= options.max_bytes {
        return encode_jpeg(&image, LIGHT_QUALITY);
    }

    let ratio = bytes.len() as f64 / options.max_bytes as f64;
    let mut quality = initial_quality(ratio);
    let mut image = image;
    let mut prepared = encode_jpeg(&image, quality)?;

    if prepared.byte_len > options.max_bytes {
        image = fit_within(image, options.fallback_box);
        prepared = encode_jpeg(&image, quality)?;
    }

    while prepared.byte_len > options.max_bytes && quality > MIN_QUALITY {
        quality = quality.saturating_sub(QUALITY_STEP).max(MIN_QUALITY);
        prepared = encode_jpeg(&image, quality)?;
    }

    if prepared.byte_len > options.max_bytes {
        warn!(
            "Image still {} bytes after recompression (ceiling {})",
            prepared.byte_len, options.max_bytes
        );
    }

    Ok(prepared)
}

/// Composite onto white and drop the alpha channel
fn flatten_alpha(source: &DynamicImage) -> DynamicImage {
    if !source.color().has_alpha() {
        return DynamicImage::ImageRgb8(source.to_rgb8());
    }

    let rgba = source.to_rgba8();
    let mut flattened = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = u16::from(pixel[3]);
        let blend = |channel: u8| -> u8 {
            ((u16::from(channel) * alpha + 255 * (255 - alpha)) / 255) as u8
        };
        flattened.put_pixel(x, y, Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
    }
    DynamicImage::ImageRgb8(flattened)
}

/// Downscale so the long edge is at most `edge`; never upscales
fn fit_within(image: DynamicImage, edge: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width.max(height) <= edge {
        return image;
    }
    image.resize(edge, edge, FilterType::Triangle)
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<PreparedImage, ImageError> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality).encode_image(image)?;

    let (width, height) = image.dimensions();
    Ok(PreparedImage {
        base64: BASE64.encode(&bytes),
        byte_len: bytes.len(),
        width,
        height,
        quality,
        degraded: false,
    })
}
