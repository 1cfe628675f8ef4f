use glam::{IVec2, UVec2, Vec4, Vec4Swizzles};

use crate::{Surface, SurfaceMap, Tex, EPSILON, MAX_RADIUS};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BilateralParams {
    /// Number of taps on each side of the center
    pub radius: u32,

    /// Standard deviation of the Gaussian, in texels
    pub sigma: f32,

    /// Maximum depth difference for a tap to be considered the same surface
    pub depth_threshold: f32,
}

impl BilateralParams {
    pub fn weight(&self, offset: i32) -> f32 {
        let sigma = self.sigma.max(EPSILON);

        (-((offset * offset) as f32) / (2.0 * sigma * sigma)).exp()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl Axis {
    pub fn offset(self, i: i32) -> IVec2 {
        match self {
            Axis::Horizontal => IVec2::new(i, 0),
            Axis::Vertical => IVec2::new(0, i),
        }
    }
}

/// One direction of the separable, edge-aware blur.
///
/// Taps that don't belong to the center's surface (see
/// [`Surface::is_similar_to()`]) are skipped and the remaining weights are
/// renormalized, so the filter never bleeds across depth or normal edges.
pub struct BilateralFilter<I, D, N> {
    pub input: I,
    pub surfaces: SurfaceMap<D, N>,
    pub params: BilateralParams,
    pub axis: Axis,
}

impl<I, D, N> BilateralFilter<I, D, N>
where
    I: Tex,
    D: Tex,
    N: Tex,
{
    pub fn run(&self, screen_pos: UVec2) -> Vec4 {
        let center = self.input.read(screen_pos);
        let center_surface = self.surfaces.get(screen_pos);

        if center_surface.is_background() {
            return center;
        }

        let radius = self.params.radius.min(MAX_RADIUS) as i32;
        let mut sum = center.xyz();
        let mut weights = 1.0;

        for i in -radius..=radius {
            if i == 0 {
                continue;
            }

            let pos = screen_pos.as_ivec2() + self.axis.offset(i);

            if !self.input.contains(pos) {
                continue;
            }

            let pos = pos.as_uvec2();
            let surface: Surface = self.surfaces.get(pos);

            if !center_surface
                .is_similar_to(&surface, self.params.depth_threshold)
            {
                continue;
            }

            let weight = self.params.weight(i);

            sum += self.input.read(pos).xyz() * weight;
            weights += weight;
        }

        (sum / weights.max(EPSILON)).extend(center.w)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::{uvec2, vec4};

    use super::*;
    use crate::testing::TestTex;

    fn params(radius: u32) -> BilateralParams {
        BilateralParams {
            radius,
            sigma: 2.0,
            depth_threshold: 0.1,
        }
    }

    #[test]
    fn constant_image_stays_constant() {
        let size = uvec2(9, 7);
        let input = TestTex::filled(size, vec4(0.3, 0.6, 0.9, 4.0));
        let depth = TestTex::filled(size, vec4(5.0, 0.0, 0.0, 0.0));
        let normal = TestTex::filled(size, vec4(0.0, 1.0, 0.0, 0.0));

        for axis in [Axis::Horizontal, Axis::Vertical] {
            for radius in [0, 1, 3, 8, 100] {
                let target = BilateralFilter {
                    input: &input,
                    surfaces: SurfaceMap::new(&depth, &normal),
                    params: params(radius),
                    axis,
                };

                for y in 0..size.y {
                    for x in 0..size.x {
                        let out = target.run(uvec2(x, y));

                        assert_relative_eq!(out.x, 0.3, epsilon = 0.00001);
                        assert_relative_eq!(out.y, 0.6, epsilon = 0.00001);
                        assert_relative_eq!(out.z, 0.9, epsilon = 0.00001);
                        assert_eq!(4.0, out.w);
                    }
                }
            }
        }
    }

    #[test]
    fn depth_edges_are_preserved() {
        let size = uvec2(8, 1);

        let input = TestTex::from_fn(size, |pos| {
            if pos.x < 4 {
                vec4(0.0, 0.0, 0.0, 1.0)
            } else {
                vec4(1.0, 1.0, 1.0, 1.0)
            }
        });

        let depth = TestTex::from_fn(size, |pos| {
            vec4(if pos.x < 4 { 1.0 } else { 10.0 }, 0.0, 0.0, 0.0)
        });

        let normal = TestTex::filled(size, vec4(0.0, 0.0, 1.0, 0.0));

        let target = BilateralFilter {
            input: &input,
            surfaces: SurfaceMap::new(&depth, &normal),
            params: params(4),
            axis: Axis::Horizontal,
        };

        for x in 0..size.x {
            assert_eq!(input.read(uvec2(x, 0)), target.run(uvec2(x, 0)));
        }

        // Vertical pass over a single row has nothing to mix with
        let target = BilateralFilter {
            axis: Axis::Vertical,
            ..target
        };

        assert_eq!(input.read(uvec2(3, 0)), target.run(uvec2(3, 0)));
    }

    #[test]
    fn background_passes_through() {
        let size = uvec2(3, 1);

        let input = TestTex::from_fn(size, |pos| {
            vec4(pos.x as f32, 0.0, 0.0, 1.0)
        });

        let depth = TestTex::from_fn(size, |pos| {
            vec4(if pos.x == 1 { 0.0 } else { 1.0 }, 0.0, 0.0, 0.0)
        });

        let normal = TestTex::filled(size, vec4(0.0, 0.0, 1.0, 0.0));

        let target = BilateralFilter {
            input: &input,
            surfaces: SurfaceMap::new(&depth, &normal),
            params: params(1),
            axis: Axis::Horizontal,
        };

        assert_eq!(vec4(1.0, 0.0, 0.0, 1.0), target.run(uvec2(1, 0)));

        // ... and background neighbours don't leak into the surface
        assert_eq!(vec4(0.0, 0.0, 0.0, 1.0), target.run(uvec2(0, 0)));
    }

    #[test]
    fn weights_are_gaussian() {
        let params = params(3);

        assert_eq!(1.0, params.weight(0));
        assert_relative_eq!(params.weight(2), (-0.5f32).exp());
        assert!(params.weight(3) < params.weight(1));
    }
}
