mod f32_ext;

use glam::{vec2, UVec2};

pub use self::f32_ext::*;

/// Returns a per-pixel pseudo-random number in `<0.0, 1.0)`.
///
/// See:
/// - https://www.iryoku.com/next-generation-post-processing-in-call-of-duty-advanced-warfare
pub fn interleaved_gradient_noise(screen_pos: UVec2, frame: u32) -> f32 {
    let pos = screen_pos.as_vec2() + 5.588238 * ((frame % 64) as f32);
    let dot = pos.dot(vec2(0.06711056, 0.00583715));

    (52.982918 * dot.fract()).fract()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_stays_in_range() {
        for y in 0..16 {
            for x in 0..16 {
                for frame in [0, 1, 63, 64, 1000] {
                    let n = interleaved_gradient_noise(UVec2::new(x, y), frame);

                    assert!((0.0..1.0).contains(&n), "n={n}");
                }
            }
        }
    }
}
