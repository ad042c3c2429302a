//! JPEG encoding at a continuous quality factor.
//!
//! This module is the re-render half of the codec capability: it encodes a
//! [`Raster`] with the `image` crate's JPEG encoder, optionally resampling
//! to different output dimensions first. Quality is the continuous control
//! in (0, 1] that the size-target search bisects over; it maps onto the
//! encoder's 1-100 scale at this boundary.

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use image::ImageEncoder;
use std::io::Cursor;
use thiserror::Error;

use crate::decode::Raster;

/// Errors that can occur during JPEG encoding.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Requested output width or height is zero
    #[error("Invalid output dimensions: width ({width}) and height ({height}) must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// The raster's pixel buffer is inconsistent with its dimensions
    #[error("Raster pixel buffer does not match {width}x{height}")]
    InvalidRaster { width: u32, height: u32 },

    /// JPEG encoding failed
    #[error("JPEG encoding failed: {0}")]
    EncodingFailed(String),
}

/// Encode a raster to JPEG bytes.
///
/// # Arguments
///
/// * `raster` - Source pixels at native resolution
/// * `quality` - Encode quality in (0, 1]; out-of-range values are clamped
/// * `output` - Optional output dimensions; when given, the raster is
///   resampled with Lanczos3 before encoding (a scaled render), otherwise
///   it is encoded at native resolution
///
/// # Returns
///
/// JPEG-encoded bytes on success, or an error if encoding fails.
pub fn encode_jpeg(
    raster: &Raster,
    quality: f32,
    output: Option<(u32, u32)>,
) -> Result<Vec<u8>, EncodeError> {
    if raster.width == 0 || raster.height == 0 {
        return Err(EncodeError::InvalidDimensions {
            width: raster.width,
            height: raster.height,
        });
    }

    let rgb = raster.to_rgb_image().ok_or(EncodeError::InvalidRaster {
        width: raster.width,
        height: raster.height,
    })?;

    let rgb = match output {
        Some((width, height)) => {
            if width == 0 || height == 0 {
                return Err(EncodeError::InvalidDimensions { width, height });
            }
            if (width, height) == (raster.width, raster.height) {
                rgb
            } else {
                image::imageops::resize(&rgb, width, height, image::imageops::FilterType::Lanczos3)
            }
        }
        None => rgb,
    };

    let mut buffer = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality_to_u8(quality));

    encoder
        .write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| EncodeError::EncodingFailed(e.to_string()))?;

    Ok(buffer.into_inner())
}

/// Map a continuous quality fraction onto the JPEG encoder's 1-100 scale.
fn quality_to_u8(quality: f32) -> u8 {
    ((quality * 100.0).round() as i32).clamp(1, 100) as u8
}


// ============================================================================
// Property-Based Tests
// ============================================================================
