use glam::{vec4, UVec2, Vec4};

use crate::{BilinearFilter, Surface, SurfaceMap, Tex, EPSILON};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UpsampleParams {
    pub depth_threshold: f32,
}

/// Reconstructs a full-resolution image out of a low-resolution one, guided by
/// full- and low-resolution geometry.
///
/// Each of the four low-resolution taps surrounding the pixel is weighted by
/// its bilinear weight and by how similar its surface is to the pixel's; when
/// no tap resembles the pixel, falls back to plain bilinear filtering.
pub struct JointBilateralUpsampler<I, LD, LN, HD, HN> {
    pub input: I,
    pub low_surfaces: SurfaceMap<LD, LN>,
    pub high_surfaces: SurfaceMap<HD, HN>,
    pub params: UpsampleParams,
}

impl<I, LD, LN, HD, HN> JointBilateralUpsampler<I, LD, LN, HD, HN>
where
    I: Tex,
    LD: Tex,
    LN: Tex,
    HD: Tex,
    HN: Tex,
{
    pub fn run(&self, screen_pos: UVec2) -> Vec4 {
        let low_size = self.input.size();
        let high_size = self.high_surfaces.size();

        let pos = (screen_pos.as_vec2() + 0.5)
            * (low_size.as_vec2() / high_size.as_vec2())
            - 0.5;

        let [p00, p10, p01, p11] =
            BilinearFilter::reprojection_coords(pos, low_size);

        let uv = pos - pos.floor();

        let bilinear = vec4(
            (1.0 - uv.x) * (1.0 - uv.y),
            uv.x * (1.0 - uv.y),
            (1.0 - uv.x) * uv.y,
            uv.x * uv.y,
        );

        let surface = self.high_surfaces.get(screen_pos);

        let samples = [p00, p10, p01, p11].map(|pos| self.input.read(pos));

        if surface.is_background() {
            return Self::blend(samples, bilinear);
        }

        let similarity = vec4(
            self.similarity(surface, p00),
            self.similarity(surface, p10),
            self.similarity(surface, p01),
            self.similarity(surface, p11),
        );

        let weights = bilinear * similarity;

        if weights.dot(Vec4::ONE) < EPSILON {
            Self::blend(samples, bilinear)
        } else {
            Self::blend(samples, weights)
        }
    }

    fn similarity(&self, surface: Surface, pos: UVec2) -> f32 {
        surface.evaluate_similarity_to(
            &self.low_surfaces.get(pos),
            self.params.depth_threshold,
        )
    }

    fn blend(samples: [Vec4; 4], weights: Vec4) -> Vec4 {
        let w_sum = weights.dot(Vec4::ONE).max(EPSILON);

        (samples[0] * weights.x
            + samples[1] * weights.y
            + samples[2] * weights.z
            + samples[3] * weights.w)
            / w_sum
    }
}

/// Returns the size of the half-resolution counterpart of an image sized
/// `size`.
pub fn half_size(size: UVec2) -> UVec2 {
    ((size + UVec2::ONE) / 2).max(UVec2::ONE)
}
