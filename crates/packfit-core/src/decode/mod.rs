//! Image decoding for the compression pipeline.
//!
//! This module turns validated upload bytes into [`Raster`] pixel buffers:
//! - Format sniffing and decoding for JPEG, PNG, WebP and GIF
//! - EXIF orientation correction (phone uploads rely on it)
//!
//! Decoding happens once per compression run; every subsequent encode
//! attempt re-renders the same raster at a different quality or scale.

mod reader;
mod types;

pub use reader::decode_image;
pub use types::{DecodeError, Orientation, Raster};
