//! Raster decoding with EXIF orientation handling.
//!
//! Decodes any of the accepted upload formats (JPEG, PNG, WebP, GIF) into
//! an RGB [`Raster`]. Phone uploads routinely carry their rotation in EXIF
//! only, so orientation is applied here, before any size-target search
//! re-renders the pixels.

use std::io::Cursor;

use exif::{In, Reader, Tag};
use image::DynamicImage;
use image::ImageReader;

use super::{DecodeError, Orientation, Raster};

/// Decode image bytes into an RGB raster, applying EXIF orientation.
///
/// The format is sniffed from the byte signature; animated inputs (GIF,
/// animated WebP) decode to their first frame.
///
/// # Errors
///
/// Returns `DecodeError::UnsupportedFormat` if the bytes carry no known
/// image signature, and `DecodeError::Corrupted` if the signature is
/// recognized but the data cannot be decoded.
pub fn decode_image(bytes: &[u8]) -> Result<Raster, DecodeError> {
    // Extract EXIF orientation before decoding; absent or unreadable EXIF
    // means no transformation.
    let orientation = extract_orientation(bytes);

    let cursor = Cursor::new(bytes);
    let reader = ImageReader::new(cursor)
        .with_guessed_format()
        .map_err(|e| DecodeError::Corrupted(e.to_string()))?;

    if reader.format().is_none() {
        return Err(DecodeError::UnsupportedFormat);
    }

    let img = reader
        .decode()
        .map_err(|e| DecodeError::Corrupted(e.to_string()))?;

    let oriented = apply_orientation(img, orientation);
    Ok(Raster::from_rgb_image(oriented.into_rgb8()))
}

/// Extract EXIF orientation from image bytes.
///
/// Returns `Orientation::Normal` if no EXIF data is found or orientation
/// cannot be determined.
fn extract_orientation(bytes: &[u8]) -> Orientation {
    let exif_reader = Reader::new();
    let mut cursor = Cursor::new(bytes);

    match exif_reader.read_from_container(&mut cursor) {
        Ok(exif) => {
            if let Some(field) = exif.get_field(Tag::Orientation, In::PRIMARY) {
                if let Some(value) = field.value.get_uint(0) {
                    return Orientation::from(value);
                }
            }
            Orientation::Normal
        }
        Err(_) => Orientation::Normal,
    }
}

/// Apply EXIF orientation transformation to an image.
fn apply_orientation(img: DynamicImage, orientation: Orientation) -> DynamicImage {
    match orientation {
        Orientation::Normal => img,
        Orientation::FlipHorizontal => img.fliph(),
        Orientation::Rotate180 => img.rotate180(),
        Orientation::FlipVertical => img.flipv(),
        Orientation::Transpose => img.rotate90().fliph(),
        Orientation::Rotate90CW => img.rotate90(),
        Orientation::Transverse => img.rotate270().fliph(),
        Orientation::Rotate270CW => img.rotate270(),
    }
}
