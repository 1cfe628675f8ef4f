use glam::{UVec2, Vec4};

use crate::{Surface, Tex};

/// Range of input texels `[min, max)` covered by given output texel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Footprint {
    pub min: UVec2,
    pub max: UVec2,
}

impl Footprint {
    pub fn new(
        screen_pos: UVec2,
        input_size: UVec2,
        output_size: UVec2,
    ) -> Self {
        let output_size = output_size.max(UVec2::ONE);
        let min = (screen_pos * input_size) / output_size;

        let max = ((screen_pos + UVec2::ONE) * input_size + output_size
            - UVec2::ONE)
            / output_size;

        let min = min.min(input_size.max(UVec2::ONE) - UVec2::ONE);
        let max = max.min(input_size).max(min + UVec2::ONE);

        Self { min, max }
    }

    pub fn iter(self) -> impl Iterator<Item = UVec2> {
        (self.min.y..self.max.y).flat_map(move |y| {
            (self.min.x..self.max.x).map(move |x| UVec2::new(x, y))
        })
    }
}

/// Box-filters the input into a smaller output.
pub struct AverageDownsampler<I> {
    pub input: I,
    pub output_size: UVec2,
}

impl<I> AverageDownsampler<I>
where
    I: Tex,
{
    pub fn run(&self, screen_pos: UVec2) -> Vec4 {
        let footprint =
            Footprint::new(screen_pos, self.input.size(), self.output_size);

        let mut sum = Vec4::ZERO;
        let mut count = 0.0;

        for pos in footprint.iter() {
            sum += self.input.read(pos);
            count += 1.0;
        }

        sum / count
    }
}

/// Picks, out of the input texels covered by an output texel, the one closest
/// to the camera.
///
/// Averaging depths (or normals, or motion vectors) would invent surfaces that
/// don't exist, so geometry gets downsampled by selection instead; the
/// returned position is then used to copy every geometry channel.
pub struct ClosestDownsampler<D> {
    pub depth: D,
    pub output_size: UVec2,
}

impl<D> ClosestDownsampler<D>
where
    D: Tex,
{
    pub fn run(&self, screen_pos: UVec2) -> UVec2 {
        let footprint =
            Footprint::new(screen_pos, self.depth.size(), self.output_size);

        let mut closest = footprint.min;
        let mut closest_depth = f32::INFINITY;

        for pos in footprint.iter() {
            let surface = Surface {
                normal: Default::default(),
                depth: self.depth.read(pos).x,
            };

            if !surface.is_background() && surface.depth < closest_depth {
                closest = pos;
                closest_depth = surface.depth;
            }
        }

        closest
    }
}

#[cfg(test)]
mod tests {
    use glam::{uvec2, vec4};

    use super::*;
    use crate::testing::TestTex;

    #[test]
    fn footprints() {
        assert_eq!(
            Footprint {
                min: uvec2(2, 4),
                max: uvec2(4, 6),
            },
            Footprint::new(uvec2(1, 2), uvec2(8, 8), uvec2(4, 4)),
        );

        // Odd sizes round the footprint outwards
        assert_eq!(
            Footprint {
                min: uvec2(2, 0),
                max: uvec2(5, 2),
            },
            Footprint::new(uvec2(1, 0), uvec2(5, 3), uvec2(2, 2)),
        );

        // Identity
        assert_eq!(
            Footprint {
                min: uvec2(3, 1),
                max: uvec2(4, 2),
            },
            Footprint::new(uvec2(3, 1), uvec2(6, 6), uvec2(6, 6)),
        );
    }

    #[test]
    fn average() {
        let input = TestTex::from_fn(uvec2(4, 2), |pos| {
            vec4(pos.x as f32, pos.y as f32, 1.0, 0.0)
        });

        let target = AverageDownsampler {
            input: &input,
            output_size: uvec2(2, 1),
        };

        assert_eq!(vec4(0.5, 0.5, 1.0, 0.0), target.run(uvec2(0, 0)));
        assert_eq!(vec4(2.5, 0.5, 1.0, 0.0), target.run(uvec2(1, 0)));
    }

    #[test]
    fn closest() {
        let depth = TestTex::from_fn(uvec2(4, 2), |pos| {
            let depth = match (pos.x, pos.y) {
                (0, 0) => 0.0,
                (1, 0) => 3.0,
                (0, 1) => 2.0,
                (1, 1) => 5.0,
                _ => 0.0,
            };

            vec4(depth, 0.0, 0.0, 0.0)
        });

        let target = ClosestDownsampler {
            depth: &depth,
            output_size: uvec2(2, 1),
        };

        // Background (zero depth) never wins
        assert_eq!(uvec2(0, 1), target.run(uvec2(0, 0)));

        // ... unless there's nothing else
        assert_eq!(uvec2(2, 0), target.run(uvec2(1, 0)));
    }
}
