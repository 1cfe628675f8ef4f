//! Common algorithms used by afterimage's kernels.
//!
//! Everything in here works on a single pixel at a time, reading from abstract
//! textures (see [`Tex`]); the CPU backend drives these functions directly and
//! the WGSL kernels of the wgpu backend mirror them line-by-line.

#![allow(clippy::len_without_is_empty)]
#![allow(clippy::manual_range_contains)]

mod accumulation;
mod bilateral;
mod bilinear_filter;
mod downsample;
mod passes;
mod reprojection;
mod ssao;
mod surface;
mod tex;
mod upsample;
mod utils;

#[cfg(test)]
mod testing;

pub use self::accumulation::*;
pub use self::bilateral::*;
pub use self::bilinear_filter::*;
pub use self::downsample::*;
pub use self::passes::*;
pub use self::reprojection::*;
pub use self::ssao::*;
pub use self::surface::*;
pub use self::tex::*;
pub use self::upsample::*;
pub use self::utils::*;

/// Floor applied to every denominator that could otherwise reach zero.
pub const EPSILON: f32 = 0.0001;

/// Golden angle, used to spread samples of spatial kernels.
pub const GOLDEN_ANGLE: f32 = 2.39996;

/// Minimum cosine between two normals for their surfaces to be considered the
/// same by the bilateral filter.
pub const NORMAL_TOLERANCE: f32 = 0.9;

/// Maximum radius (in texels) of the bilateral filter.
pub const MAX_RADIUS: u32 = 16;

/// Maximum number of taps of the SSAO estimator.
pub const MAX_SAMPLES: u32 = 64;

/// Maximum number of frames the confidence-ratio accumulation remembers.
pub const MAX_HISTORY: f32 = 32.0;
