//! JPEG encoding for compressed output.
//!
//! All compressed output is JPEG regardless of input format, matching the
//! publish targets the presets are authored for. The encoder accepts a
//! continuous quality fraction and an optional scaled output size, which
//! together form the search space of the size-target algorithm.

mod jpeg;

pub use jpeg::{encode_jpeg, EncodeError};
