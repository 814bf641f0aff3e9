//! Pure calculation functions for upscale dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::backend::Dimensions;
use thiserror::Error;

/// Largest edge the enhancement provider accepts, in pixels.
pub const MAX_PROVIDER_DIMENSION: u32 = 4096;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid dimensions {width}x{height} at factor {factor}: all values must be positive")]
pub struct InvalidDimensions {
    pub width: u32,
    pub height: u32,
    pub factor: u32,
}

/// Target dimensions for one upscale request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpscalePlan {
    /// Output dimensions after capping.
    pub target: Dimensions,
    /// Scale actually applied to both axes (never below 1).
    pub scale: f64,
    /// True when the provider limit, not the requested factor, set the scale.
    pub capped: bool,
}

/// Calculate capped target dimensions for an upscale.
///
/// The scale is the smallest of the requested factor and the ratios that
/// would pin either edge to `max_dimension`, floored at 1 so an image is
/// never shrunk. Each axis is rounded independently.
///
/// # Examples
/// ```
/// # use magnify::imaging::{Dimensions, plan_upscale};
/// // 1000x1000 at 4x fits under the 4096 cap
/// let plan = plan_upscale(Dimensions { width: 1000, height: 1000 }, 4, 4096).unwrap();
/// assert_eq!(plan.target, Dimensions { width: 4000, height: 4000 });
///
/// // 2000x3000 at 4x is pinned by the height
/// let plan = plan_upscale(Dimensions { width: 2000, height: 3000 }, 4, 4096).unwrap();
/// assert_eq!(plan.target, Dimensions { width: 2731, height: 4096 });
/// ```
pub fn plan_upscale(
    original: Dimensions,
    factor: u32,
    max_dimension: u32,
) -> Result<UpscalePlan, InvalidDimensions> {
    let Dimensions { width, height } = original;
    if width == 0 || height == 0 || factor == 0 {
        return Err(InvalidDimensions {
            width,
            height,
            factor,
        });
    }

    let max = max_dimension as f64;
    let fit = (max / width as f64).min(max / height as f64);
    let requested = factor as f64;
    let scale_cap = requested.min(fit);
    let scale = scale_cap.max(1.0);

    Ok(UpscalePlan {
        target: Dimensions {
            width: scale_axis(width, scale),
            height: scale_axis(height, scale),
        },
        scale,
        capped: fit < requested,
    })
}

fn scale_axis(edge: u32, scale: f64) -> u32 {
    ((edge as f64 * scale).round() as u32).max(1)
}
