//! Compression target profiles.
//!
//! A [`Profile`] bundles every parameter that governs one size-constrained
//! compression run: the byte ceiling, the bisection budget, the downscale
//! fallback ladder, and the last-resort quality floor. Profiles are built
//! once and never mutated; the canonical presets match the publish limits
//! of the platforms the tool targets.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reported by [`Profile::validate`].
#[derive(Debug, Error)]
pub enum ProfileError {
    /// The byte ceiling must be positive.
    #[error("target size must be greater than zero bytes")]
    ZeroTarget,

    /// A scale factor fell outside the half-open interval (0, 1].
    #[error("scale factor {0} is outside (0, 1]")]
    ScaleFactorOutOfRange(f32),

    /// The quality floor fell outside the half-open interval (0, 1].
    #[error("quality floor {0} is outside (0, 1]")]
    QualityFloorOutOfRange(f32),
}

/// Parameter bundle for one compression run.
///
/// `target_bytes` should be authored with a safety margin below any
/// externally-advertised hard limit; the engine itself enforces no
/// separate limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Hard ceiling the encoder tries not to exceed, in bytes.
    pub target_bytes: usize,
    /// Maximum number of quality-bisection encode attempts.
    pub max_iterations: u32,
    /// Downscale fallback ladder, each factor in (0, 1], applied in order.
    pub scale_factors: Vec<f32>,
    /// Last-resort encode quality in (0, 1].
    pub min_quality: f32,
}

impl Profile {
    /// Create a profile from explicit parameters.
    pub fn new(
        target_bytes: usize,
        max_iterations: u32,
        scale_factors: Vec<f32>,
        min_quality: f32,
    ) -> Self {
        Self {
            target_bytes,
            max_iterations,
            scale_factors,
            min_quality,
        }
    }

    /// Preset for sticker-pack images: 450 KiB target, margin under a
    /// 500 KB publish limit.
    pub fn compact() -> Self {
        Self {
            target_bytes: 450 * 1024,
            max_iterations: 10,
            scale_factors: vec![0.9, 0.8, 0.7, 0.6, 0.5, 0.4],
            min_quality: 0.7,
        }
    }

    /// Preset for cover images: 280 KiB target, margin under a 300 KB
    /// publish limit. Searches harder and scales further down than
    /// [`Profile::compact`] because covers have a tighter ceiling.
    pub fn cover() -> Self {
        Self {
            target_bytes: 280 * 1024,
            max_iterations: 15,
            scale_factors: vec![0.9, 0.8, 0.7, 0.6, 0.5, 0.4, 0.3, 0.25],
            min_quality: 0.5,
        }
    }

    /// Reduced-effort variant used when the caller opts out of aggressive
    /// optimization: no downscale fallback, bisection capped at 3 attempts.
    pub fn reduced_effort(mut self) -> Self {
        self.max_iterations = self.max_iterations.min(3);
        self.scale_factors.clear();
        self
    }

    /// Check that every parameter is in range.
    ///
    /// Presets are valid by construction; call this on profiles built from
    /// caller-supplied values.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.target_bytes == 0 {
            return Err(ProfileError::ZeroTarget);
        }
        for &factor in &self.scale_factors {
            if !(factor > 0.0 && factor <= 1.0) {
                return Err(ProfileError::ScaleFactorOutOfRange(factor));
            }
        }
        if !(self.min_quality > 0.0 && self.min_quality <= 1.0) {
            return Err(ProfileError::QualityFloorOutOfRange(self.min_quality));
        }
        Ok(())
    }
}
