use glam::{UVec2, Vec2, Vec4, Vec4Swizzles};

use crate::{BilinearFilter, Tex};

/// Where a pixel of the current frame was located in the previous frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Reprojection {
    /// Position in the history texture, in texels; texel centers lie on
    /// integer coordinates.
    pub prev_pos: Vec2,

    /// Whether the previous position lies inside the history texture.
    pub valid: bool,
}

impl Reprojection {
    /// Reprojects pixel at `screen_pos` (of a screen sized `screen_size`) into
    /// a history texture sized `history_size`, given the pixel's motion in UV
    /// space.
    ///
    /// Both sizes can differ - that's the case when a half-resolution pass
    /// reads a full-resolution history.
    pub fn new(
        screen_pos: UVec2,
        screen_size: UVec2,
        history_size: UVec2,
        motion: Vec2,
    ) -> Self {
        let screen_pos = screen_pos.as_vec2() + 0.5;
        let history_size = history_size.as_vec2();

        let prev_uv = screen_pos / screen_size.as_vec2() - motion;

        let valid = prev_uv.x >= 0.0
            && prev_uv.y >= 0.0
            && prev_uv.x <= 1.0
            && prev_uv.y <= 1.0;

        let prev_pos = screen_pos * (history_size / screen_size.as_vec2())
            - motion * history_size
            - 0.5;

        Self { prev_pos, valid }
    }

    pub fn is_some(&self) -> bool {
        self.valid
    }

    pub fn is_none(&self) -> bool {
        !self.is_some()
    }

    pub fn prev_pos_round(&self) -> UVec2 {
        self.prev_pos.round().max(Vec2::ZERO).as_uvec2()
    }

    pub fn prev_pos_fract(&self) -> Vec2 {
        self.prev_pos - self.prev_pos.floor()
    }

    pub fn is_exact(&self) -> bool {
        self.prev_pos_fract().length_squared() == 0.0
    }
}

/// Warps history into the current frame.
///
/// Output has the size of the motion texture; history texels with `w == 0`
/// are treated as missing, and so are pixels that reproject outside of the
/// history - both produce `Vec4::ZERO`, i.e. "no prior information".
pub struct Reprojector<H, M> {
    pub history: H,
    pub motion: M,
}

impl<H, M> Reprojector<H, M>
where
    H: Tex,
    M: Tex,
{
    pub fn run(&self, screen_pos: UVec2) -> Vec4 {
        let reprojection = Reprojection::new(
            screen_pos,
            self.motion.size(),
            self.history.size(),
            self.motion.read(screen_pos).xy(),
        );

        if reprojection.is_none() {
            return Vec4::ZERO;
        }

        BilinearFilter::reproject(reprojection, self.history.size(), |pos| {
            let sample = self.history.read(pos);
            let weight = if sample.w > 0.0 { 1.0 } else { 0.0 };

            (sample, weight)
        })
    }
}
