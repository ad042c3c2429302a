//! The decode/encode capability seam.
//!
//! The size-target search is written against [`Codec`] rather than the
//! concrete `image`-crate functions, so tests can substitute synthetic
//! codecs with known size behavior and hosts can swap in a different
//! encoder without touching the search. [`StdCodec`] is the production
//! implementation.

use crate::decode::{decode_image, DecodeError, Raster};
use crate::encode::{encode_jpeg, EncodeError};

/// Decode/encode capability consumed by the size-target search.
///
/// `encode` with `output` dimensions must be equivalent to re-rendering
/// the raster at that size and encoding the result; quality is a
/// continuous lossy-compression factor in (0, 1].
pub trait Codec {
    /// Decode source bytes into an RGB raster.
    fn decode(&self, bytes: &[u8]) -> Result<Raster, DecodeError>;

    /// Encode a raster at the given quality, optionally re-rendered to
    /// `output` dimensions first.
    fn encode(
        &self,
        raster: &Raster,
        quality: f32,
        output: Option<(u32, u32)>,
    ) -> Result<Vec<u8>, EncodeError>;
}

/// Production codec backed by the `image` crate: multi-format decode with
/// EXIF orientation correction, JPEG output.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdCodec;

impl Codec for StdCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Raster, DecodeError> {
        decode_image(bytes)
    }

    fn encode(
        &self,
        raster: &Raster,
        quality: f32,
        output: Option<(u32, u32)>,
    ) -> Result<Vec<u8>, EncodeError> {
        encode_jpeg(raster, quality, output)
    }
}
