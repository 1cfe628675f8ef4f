use glam::{ivec2, vec4, IVec2, UVec2, Vec2, Vec4};

use crate::{Reprojection, EPSILON};

#[derive(Clone, Copy, Debug)]
pub struct BilinearFilter {
    /// Sample at `f(x=0, y=0)`
    pub s00: Vec4,

    /// Sample at `f(x=1, y=0)`
    pub s10: Vec4,

    /// Sample at `f(x=0, y=1)`
    pub s01: Vec4,

    /// Sample at `f(x=1, y=1)`
    pub s11: Vec4,

    /// Weights for each sample
    pub weights: Vec4,
}

impl BilinearFilter {
    /// Samples a texture sized `size` at the reprojected position.
    ///
    /// `sample` returns the texel and its weight; texels with zero weight
    /// don't contribute and if no texel contributes, `Vec4::ZERO` is returned.
    pub fn reproject(
        reprojection: Reprojection,
        size: UVec2,
        sample: impl Fn(UVec2) -> (Vec4, f32),
    ) -> Vec4 {
        if reprojection.is_exact() {
            let pos = reprojection
                .prev_pos
                .as_ivec2()
                .max(IVec2::ZERO)
                .min(size.as_ivec2() - IVec2::ONE)
                .as_uvec2();

            let (sample, weight) = sample(pos);

            if weight > 0.0 {
                sample
            } else {
                Vec4::ZERO
            }
        } else {
            Self::from_reprojection(reprojection, size, sample)
                .eval(reprojection.prev_pos_fract())
        }
    }

    pub fn from_reprojection(
        reprojection: Reprojection,
        size: UVec2,
        sample: impl Fn(UVec2) -> (Vec4, f32),
    ) -> Self {
        let [p00, p10, p01, p11] =
            Self::reprojection_coords(reprojection.prev_pos, size);

        let (s00, w00) = sample(p00);
        let (s10, w10) = sample(p10);
        let (s01, w01) = sample(p01);
        let (s11, w11) = sample(p11);

        Self {
            s00,
            s10,
            s01,
            s11,
            weights: vec4(w00, w10, w01, w11),
        }
    }

    /// Returns coordinates of the four texels surrounding given position,
    /// clamped to the texture's edges.
    pub fn reprojection_coords(pos: Vec2, size: UVec2) -> [UVec2; 4] {
        let max = size.as_ivec2() - IVec2::ONE;
        let p00 = pos.floor().as_ivec2();

        [
            p00,
            p00 + ivec2(1, 0),
            p00 + ivec2(0, 1),
            p00 + ivec2(1, 1),
        ]
        .map(|pos| pos.max(IVec2::ZERO).min(max).as_uvec2())
    }

    pub fn eval(&self, uv: Vec2) -> Vec4 {
        let weights = self.weights
            * vec4(
                (1.0 - uv.x) * (1.0 - uv.y),
                uv.x * (1.0 - uv.y),
                (1.0 - uv.x) * uv.y,
                uv.x * uv.y,
            );

        let w_sum = weights.dot(Vec4::ONE);

        if w_sum < EPSILON {
            Vec4::ZERO
        } else {
            (self.s00 * weights.x
                + self.s10 * weights.y
                + self.s01 * weights.z
                + self.s11 * weights.w)
                / w_sum
        }
    }
}
