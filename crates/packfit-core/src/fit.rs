//! Size-targeted adaptive compression search.
//!
//! [`fit_to_target`] takes source bytes and a [`Profile`] and produces
//! output whose byte size is at or below the profile's ceiling whenever
//! that is feasible within the search budget. The search runs three
//! phases, each attempt costing one encode-capability call:
//!
//! 1. **Quality bisection** over the continuous quality factor at native
//!    resolution, up to `max_iterations` attempts.
//! 2. **Progressive downscale** through the profile's scale ladder at a
//!    fixed high quality, accepting the first fit.
//! 3. **Quality floor**: one last encode of the last-used canvas at
//!    `min_quality`, accepted regardless of size.
//!
//! An input already at or below the ceiling is returned untouched without
//! a single capability call.
//!
//! The bisection assumes encoded size is monotonically non-decreasing in
//! quality. That holds for typical lossy encoders but is a heuristic, not
//! a guarantee; a non-monotone encoder can waste search budget, never
//! produce an over-target result labeled successful, because success is
//! only ever claimed for an attempt that measured at or below the ceiling.

use thiserror::Error;

use crate::codec::Codec;
use crate::decode::DecodeError;
use crate::encode::EncodeError;
use crate::profile::Profile;
use crate::util::format_size;

/// Lower bound of the quality search interval.
const QUALITY_MIN: f32 = 0.1;
/// Upper bound of the quality search interval.
const QUALITY_MAX: f32 = 1.0;
/// Initial working quality for the bisection.
const QUALITY_START: f32 = 0.9;
/// Interval width below which the bisection stops; gains past this point
/// are negligible.
const CONVERGENCE: f32 = 0.01;
/// Fixed encode quality for the downscale ladder.
const RESCALE_QUALITY: f32 = 0.92;

/// Hard failures of the capability layer. Soft size-target misses are not
/// errors; they come back as a [`FitOutcome`] with `success == false`.
#[derive(Debug, Error)]
pub enum FitError {
    /// The source bytes could not be decoded; no output is available.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The encode capability failed mid-search; no output is available.
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Result of one size-target search.
#[derive(Debug, Clone)]
pub struct FitOutcome {
    /// Output bytes: the accepted encode, or the most recent attempt when
    /// the target was not met. Never empty.
    pub bytes: Vec<u8>,
    /// Byte size of `bytes`.
    pub size: usize,
    /// Whether `size` is at or below the profile's target.
    pub success: bool,
    /// Human-readable reason when `success` is false, including the
    /// achieved size.
    pub message: Option<String>,
}

impl FitOutcome {
    fn fit(bytes: Vec<u8>) -> Self {
        let size = bytes.len();
        Self {
            bytes,
            size,
            success: true,
            message: None,
        }
    }

    fn over_target(bytes: Vec<u8>) -> Self {
        let size = bytes.len();
        Self {
            bytes,
            size,
            success: false,
            message: Some(format!(
                "compressed output still exceeds target ({})",
                format_size(size)
            )),
        }
    }
}

/// Search the quality/scale space for an encode of `source` no larger
/// than `profile.target_bytes`.
///
/// Issues at most one decode call and
/// `profile.max_iterations + profile.scale_factors.len() + 1` encode
/// calls against `codec`.
///
/// # Errors
///
/// Returns [`FitError`] only for capability failures (undecodable input,
/// encoder fault). Exhausting the search budget over target is not an
/// error: the outcome carries the best-effort bytes with
/// `success == false`.
pub fn fit_to_target<C: Codec + ?Sized>(
    codec: &C,
    source: &[u8],
    profile: &Profile,
) -> Result<FitOutcome, FitError> {
    // Already compliant input is never re-encoded, let alone degraded.
    if source.len() <= profile.target_bytes {
        return Ok(FitOutcome::fit(source.to_vec()));
    }

    let raster = codec.decode(source)?;

    // Phase 1: bisect quality at native resolution. An acceptable attempt
    // raises the lower bound and the search pushes back toward high
    // quality; the most recent acceptable attempt is kept.
    let mut lo = QUALITY_MIN;
    let mut hi = QUALITY_MAX;
    let mut quality = QUALITY_START;
    let mut best_fit: Option<Vec<u8>> = None;

    for _ in 0..profile.max_iterations {
        let attempt = codec.encode(&raster, quality, None)?;

        if attempt.len() <= profile.target_bytes {
            best_fit = Some(attempt);
            lo = quality;
            quality = f32::min(hi, (quality + hi) / 2.0);
            if hi - quality < CONVERGENCE {
                break;
            }
        } else {
            hi = quality;
            quality = f32::max(lo, (quality + lo) / 2.0);
            if quality - lo < CONVERGENCE {
                break;
            }
        }
    }

    if let Some(bytes) = best_fit {
        return Ok(FitOutcome::fit(bytes));
    }

    // Phase 2: quality alone was not enough; walk the downscale ladder at
    // a fixed high quality and take the first canvas that fits.
    let mut floor_dims = None;
    for &factor in &profile.scale_factors {
        let width = ((raster.width as f32 * factor).round() as u32).max(1);
        let height = ((raster.height as f32 * factor).round() as u32).max(1);
        floor_dims = Some((width, height));

        let attempt = codec.encode(&raster, RESCALE_QUALITY, Some((width, height)))?;
        if attempt.len() <= profile.target_bytes {
            return Ok(FitOutcome::fit(attempt));
        }
    }

    // Phase 3: last resort. Encode the last-used canvas at the quality
    // floor and accept whatever comes out.
    let bytes = codec.encode(&raster, profile.min_quality, floor_dims)?;
    if bytes.len() <= profile.target_bytes {
        Ok(FitOutcome::fit(bytes))
    } else {
        Ok(FitOutcome::over_target(bytes))
    }
}



// ============================================================================
// Property-Based Tests
// ============================================================================
