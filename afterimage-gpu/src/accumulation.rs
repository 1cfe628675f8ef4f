use glam::{ivec2, UVec2, Vec3, Vec4, Vec4Swizzles};

use crate::{Tex, EPSILON, MAX_HISTORY};

/// Neighborhood of the current frame used to clip the history.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Neighborhood {
    /// Only the pixel itself; clipping then reduces to taking the current
    /// frame as-is.
    Single,

    /// The pixel and its eight neighbours.
    Box3x3,
}

/// Shape of the box the history gets clipped into.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ClipBox {
    /// Per-channel minimum and maximum of the neighborhood.
    MinMax,

    /// Per-channel `mean ± gamma * stddev` of the neighborhood, intersected
    /// with the min-max box.
    ///
    /// See:
    /// - https://developer.download.nvidia.com/gameworks/events/GDC2016/msalvi_temporal_supersampling.pdf
    Variance { gamma: f32 },
}

/// Policy of blending the reprojected history with the current frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Accumulation {
    /// Clamps the history into the range of the current frame's neighborhood
    /// and blends with a fixed weight; used for anti-aliasing.
    Clip {
        neighborhood: Neighborhood,
        clip: ClipBox,
        history_weight: f32,
    },

    /// Blends with a weight that shrinks as history and the current frame
    /// disagree, up to `critical_value` (at which point the history is
    /// dropped); used for ambient occlusion and indirect lighting.
    Confidence {
        critical_value: f32,
        max_history: f32,
    },
}

impl Accumulation {
    pub const DEFAULT_HISTORY_WEIGHT: f32 = 0.9;

    pub fn clip() -> Self {
        Self::Clip {
            neighborhood: Neighborhood::Box3x3,
            clip: ClipBox::MinMax,
            history_weight: Self::DEFAULT_HISTORY_WEIGHT,
        }
    }

    pub fn confidence(critical_value: f32) -> Self {
        Self::Confidence {
            critical_value,
            max_history: MAX_HISTORY,
        }
    }
}

impl Default for Accumulation {
    fn default() -> Self {
        Self::clip()
    }
}

/// Blends reprojected history with the current frame's estimate.
///
/// Produces the new history: `xyz` holds the signal, `w` the number of frames
/// accumulated so far.
pub struct Accumulator<E, H> {
    pub estimate: E,
    pub history: H,
    pub policy: Accumulation,
}

impl<E, H> Accumulator<E, H>
where
    E: Tex,
    H: Tex,
{
    pub fn run(&self, screen_pos: UVec2) -> Vec4 {
        let current = self.estimate.read(screen_pos).xyz();
        let prev = self.history.read(screen_pos);

        if !(prev.w > 0.0) {
            return current.extend(1.0);
        }

        match self.policy {
            Accumulation::Clip {
                neighborhood,
                clip,
                history_weight,
            } => {
                let (min, max) = ClipRange::gather(
                    &self.estimate,
                    screen_pos,
                    neighborhood,
                    clip,
                );

                let prev_color = prev.xyz().clamp(min, max);
                let history_weight = history_weight.clamp(0.0, 1.0);

                // Both inputs lie in the box already, but the lerp can round
                // past its edges
                let color = prev_color
                    .lerp(current, 1.0 - history_weight)
                    .clamp(min, max);

                color.extend((prev.w + 1.0).min(MAX_HISTORY))
            }

            Accumulation::Confidence {
                critical_value,
                max_history,
            } => {
                let disagreement = (prev.xyz() - current).abs().max_element();

                let confidence = 1.0
                    - (disagreement / critical_value.max(EPSILON)).min(1.0);

                let prev_frames = prev.w.min(max_history.max(1.0) - 1.0);
                let frames = 1.0 + prev_frames.max(0.0) * confidence;

                prev.xyz().lerp(current, 1.0 / frames).extend(frames)
            }
        }
    }
}

pub struct ClipRange;

impl ClipRange {
    /// Returns the box of values the history can be clamped into.
    pub fn gather(
        estimate: &impl Tex,
        screen_pos: UVec2,
        neighborhood: Neighborhood,
        clip: ClipBox,
    ) -> (Vec3, Vec3) {
        let center = estimate.read(screen_pos).xyz();

        if let Neighborhood::Single = neighborhood {
            return (center, center);
        }

        let mut min = center;
        let mut max = center;
        let mut m1 = Vec3::ZERO;
        let mut m2 = Vec3::ZERO;

        for dy in -1..=1 {
            for dx in -1..=1 {
                let sample = estimate
                    .read_clamped(screen_pos.as_ivec2() + ivec2(dx, dy))
                    .xyz();

                min = min.min(sample);
                max = max.max(sample);
                m1 += sample;
                m2 += sample * sample;
            }
        }

        match clip {
            ClipBox::MinMax => (min, max),

            ClipBox::Variance { gamma } => {
                let mean = m1 / 9.0;
                let stddev = (m2 / 9.0 - mean * mean).max(Vec3::ZERO);
                let stddev = Vec3::new(
                    stddev.x.sqrt(),
                    stddev.y.sqrt(),
                    stddev.z.sqrt(),
                );

                let mean = mean.clamp(min, max);

                (
                    (mean - gamma * stddev).max(min).min(mean),
                    (mean + gamma * stddev).min(max).max(mean),
                )
            }
        }
    }
}
