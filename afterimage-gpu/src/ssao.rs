use glam::{vec2, IVec2, UVec2, Vec2, Vec4};

use crate::{
    interleaved_gradient_noise, F32Ext, Surface, SurfaceMap, Tex, EPSILON,
    GOLDEN_ANGLE, MAX_SAMPLES,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SsaoParams {
    /// Radius of the sampling disk, in texels of the estimate
    pub radius: f32,

    /// Number of taps per pixel
    pub samples: u32,

    /// Minimum depth difference for a tap to count as an occluder
    pub bias: f32,

    /// Strength of the effect; `0.0` disables it
    pub intensity: f32,

    /// Depth difference at which an occluder stops contributing, so that
    /// objects far in front of a surface don't darken it
    pub max_distance: f32,

    /// Frame index, rotates the sampling pattern
    pub frame: u32,
}

/// Estimates ambient occlusion from the depth buffer alone.
///
/// Taps are spread over a golden-angle spiral rotated by a per-pixel noise, so
/// neighbouring pixels (and consecutive frames) sample different directions;
/// the resulting noise is what the temporal and spatial filters get rid of.
pub struct SsaoEstimator<D, N> {
    pub surfaces: SurfaceMap<D, N>,
    pub params: SsaoParams,
}

impl<D, N> SsaoEstimator<D, N>
where
    D: Tex,
    N: Tex,
{
    pub fn run(&self, screen_pos: UVec2) -> Vec4 {
        let center = self.surfaces.get(screen_pos);

        if center.is_background() {
            return Vec4::ONE;
        }

        let samples = self.params.samples.clamp(1, MAX_SAMPLES);
        let rotation = interleaved_gradient_noise(screen_pos, self.params.frame)
            * core::f32::consts::TAU;

        let mut occlusion = 0.0;

        for i in 0..samples {
            let offset =
                Self::spiral(i, samples, rotation) * self.params.radius;

            let pos = (screen_pos.as_vec2() + offset).round().as_ivec2();

            if pos == screen_pos.as_ivec2() || !self.surfaces_contain(pos) {
                continue;
            }

            let tap = self.surfaces.get(pos.as_uvec2());

            occlusion += self.occlusion(center, tap);
        }

        let ao = (1.0 - self.params.intensity * occlusion / (samples as f32))
            .saturate();

        Vec4::new(ao, ao, ao, 1.0)
    }

    /// Returns the `i`-th point of a unit-disk spiral of `n` points.
    pub fn spiral(i: u32, n: u32, rotation: f32) -> Vec2 {
        let r = ((i as f32 + 0.5) / (n as f32)).sqrt();
        let theta = (i as f32) * GOLDEN_ANGLE + rotation;

        vec2(theta.cos(), theta.sin()) * r
    }

    fn surfaces_contain(&self, pos: IVec2) -> bool {
        let size = self.surfaces.size().as_ivec2();

        pos.x >= 0 && pos.y >= 0 && pos.x < size.x && pos.y < size.y
    }

    fn occlusion(&self, center: Surface, tap: Surface) -> f32 {
        if tap.is_background() {
            return 0.0;
        }

        let diff = center.depth - tap.depth;

        if diff <= self.params.bias {
            return 0.0;
        }

        let falloff = self.params.max_distance.max(EPSILON);

        (1.0 - (diff - self.params.bias) / falloff).saturate()
    }
}

#[cfg(test)]
mod tests {
    use glam::{uvec2, vec4};

    use super::*;
    use crate::testing::TestTex;

    fn params() -> SsaoParams {
        SsaoParams {
            radius: 3.0,
            samples: 16,
            bias: 0.05,
            intensity: 1.0,
            max_distance: 2.0,
            frame: 0,
        }
    }

    #[test]
    fn spiral_stays_in_unit_disk() {
        for n in [1, 8, 64] {
            for i in 0..n {
                let p = SsaoEstimator::<TestTex, TestTex>::spiral(i, n, 1.0);

                assert!(p.length() <= 1.0 + EPSILON, "p={p}");
            }
        }
    }

    #[test]
    fn flat_plane_is_unoccluded() {
        let depth = TestTex::filled(uvec2(16, 16), vec4(4.0, 0.0, 0.0, 0.0));
        let normal = TestTex::filled(uvec2(16, 16), vec4(0.0, 0.0, 1.0, 0.0));

        for frame in 0..4 {
            let target = SsaoEstimator {
                surfaces: SurfaceMap::new(&depth, &normal),
                params: SsaoParams { frame, ..params() },
            };

            for y in 0..16 {
                for x in 0..16 {
                    assert_eq!(Vec4::ONE, target.run(uvec2(x, y)));
                }
            }
        }
    }

    #[test]
    fn pits_are_occluded() {
        let depth = TestTex::from_fn(uvec2(16, 16), |pos| {
            let depth = if pos == uvec2(8, 8) { 5.0 } else { 4.0 };

            vec4(depth, 0.0, 0.0, 0.0)
        });

        let normal = TestTex::filled(uvec2(16, 16), vec4(0.0, 0.0, 1.0, 0.0));

        let target = SsaoEstimator {
            surfaces: SurfaceMap::new(&depth, &normal),
            params: params(),
        };

        let ao = target.run(uvec2(8, 8));

        assert!(ao.x < 1.0, "ao={ao}");
        assert!(ao.x >= 0.0, "ao={ao}");

        // ... unless the effect is off
        let target = SsaoEstimator {
            params: SsaoParams {
                intensity: 0.0,
                ..params()
            },
            ..target
        };

        assert_eq!(Vec4::ONE, target.run(uvec2(8, 8)));
    }

    #[test]
    fn background_is_unoccluded() {
        let depth = TestTex::filled(uvec2(4, 4), Vec4::ZERO);
        let normal = TestTex::filled(uvec2(4, 4), Vec4::ZERO);

        let target = SsaoEstimator {
            surfaces: SurfaceMap::new(&depth, &normal),
            params: params(),
        };

        assert_eq!(Vec4::ONE, target.run(uvec2(1, 1)));
    }
}
