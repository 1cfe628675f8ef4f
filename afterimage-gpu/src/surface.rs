use glam::{UVec2, Vec3, Vec4Swizzles};

use crate::{Tex, EPSILON, NORMAL_TOLERANCE};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Surface {
    pub normal: Vec3,
    pub depth: f32,
}

impl Surface {
    /// Returns whether this surface represents "nothing", i.e. the sky or the
    /// cleared part of the depth buffer.
    pub fn is_background(&self) -> bool {
        !(self.depth > 0.0) || !self.depth.is_finite()
    }

    /// Returns whether both surfaces are close enough (in terms of depth and
    /// orientation) for their samples to be mixed together.
    ///
    /// This is the hard edge-stopping term used by the bilateral filter; see
    /// [`Self::evaluate_similarity_to()`] for the continuous version.
    pub fn is_similar_to(&self, other: &Self, depth_threshold: f32) -> bool {
        if other.is_background() {
            return false;
        }

        (self.depth - other.depth).abs() <= depth_threshold
            && self.normal.dot(other.normal) >= NORMAL_TOLERANCE
    }

    /// Returns a score `<0.0, 1.0>` that determines the similarity of two given
    /// surfaces.
    pub fn evaluate_similarity_to(
        &self,
        other: &Self,
        depth_threshold: f32,
    ) -> f32 {
        if other.is_background() {
            return 0.0;
        }

        let normal_score = self.normal.dot(other.normal).max(0.0).powi(8);

        let depth_score = 1.0
            - ((self.depth - other.depth).abs() / depth_threshold.max(EPSILON))
                .min(1.0);

        normal_score * depth_score
    }
}

#[derive(Clone, Copy)]
pub struct SurfaceMap<D, N> {
    depth: D,
    normal: N,
}

impl<D, N> SurfaceMap<D, N>
where
    D: Tex,
    N: Tex,
{
    pub fn new(depth: D, normal: N) -> Self {
        Self { depth, normal }
    }

    pub fn size(&self) -> UVec2 {
        self.depth.size()
    }

    pub fn get(&self, screen_pos: UVec2) -> Surface {
        Surface {
            normal: self.normal.read(screen_pos).xyz(),
            depth: self.depth.read(screen_pos).x,
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::vec3;

    use super::*;

    fn surface(depth: f32) -> Surface {
        Surface {
            normal: vec3(0.0, 0.0, 1.0),
            depth,
        }
    }

    #[test]
    fn background() {
        assert!(surface(0.0).is_background());
        assert!(surface(-1.0).is_background());
        assert!(surface(f32::INFINITY).is_background());
        assert!(surface(f32::NAN).is_background());
        assert!(!surface(0.5).is_background());
    }

    #[test]
    fn similarity() {
        assert!(surface(1.0).is_similar_to(&surface(1.05), 0.1));
        assert!(!surface(1.0).is_similar_to(&surface(1.5), 0.1));
        assert!(!surface(1.0).is_similar_to(&surface(0.0), 10.0));

        let tilted = Surface {
            normal: vec3(1.0, 0.0, 0.0),
            depth: 1.0,
        };

        assert!(!surface(1.0).is_similar_to(&tilted, 0.1));

        let similarity = |other: Surface| {
            surface(1.0).evaluate_similarity_to(&other, 0.1)
        };

        assert_eq!(1.0, similarity(surface(1.0)));
        assert_eq!(0.0, similarity(tilted));
        assert_eq!(0.0, similarity(surface(2.0)));
    }
}
