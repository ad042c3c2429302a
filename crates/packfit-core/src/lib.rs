//! Packfit Core - Size-constrained adaptive image compression
//!
//! This crate implements the compression engine behind Packfit: given an
//! image and a byte ceiling, it searches the encode-quality/scale space
//! for output that fits under the ceiling, trading off quality and pixel
//! dimensions automatically.
//!
//! The engine is pure and synchronous. Decoding and encoding go through
//! the [`codec::Codec`] capability seam ([`codec::StdCodec`] is the
//! production implementation); batch orchestration lives in the
//! `packfit-batch` crate.

pub mod codec;
pub mod decode;
pub mod encode;
pub mod fit;
pub mod profile;
pub mod util;

pub use codec::{Codec, StdCodec};
pub use decode::{decode_image, DecodeError, Raster};
pub use encode::{encode_jpeg, EncodeError};
pub use fit::{fit_to_target, FitError, FitOutcome};
pub use profile::{Profile, ProfileError};
pub use util::format_size;
