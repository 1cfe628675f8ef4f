use glam::{UVec2, Vec2};

use super::{
    EstimatePass, Geometry, HistoryPlacement, SourceEstimate,
    TemporalDenoiser,
};
use crate::{
    CameraHandle, DenoiseConfig, EffectTag, FrameGraph, Handle, HistoryCache,
    Image, Kernels, Result, TaaConfig,
};

/// Temporal anti-aliasing: accumulates jittered frames, clipping the history
/// to the neighborhood of the current frame.
#[derive(Clone, Debug)]
pub struct Taa {
    config: TaaConfig,
}

impl Taa {
    /// Length of the jitter sequence, in frames.
    pub const JITTER_PERIOD: u64 = 16;

    pub fn new(config: &TaaConfig) -> Self {
        Self {
            config: config.sanitized(),
        }
    }

    /// Returns the sub-pixel offset (in UV units, within half a pixel) by
    /// which the host should jitter its projection during given frame.
    pub fn jitter(frame: u64, size: UVec2) -> Vec2 {
        let idx = (frame % Self::JITTER_PERIOD) as u32 + 1;
        let offset = Vec2::new(halton(idx, 2), halton(idx, 3)) - 0.5;

        offset / size.max(UVec2::ONE).as_vec2()
    }

    /// Records anti-aliasing of `color`; the returned image is the new
    /// history.
    ///
    /// Its `w` holds the number of accumulated frames (up to
    /// [`afterimage_gpu::MAX_HISTORY`]) instead of the alpha of `color`, so
    /// hosts that need alpha have to take it from the source image.
    pub fn record<B>(
        &self,
        graph: &mut FrameGraph<B>,
        backend: &mut B,
        history: &mut HistoryCache<B::Resource>,
        camera: CameraHandle,
        color: Handle<Image>,
        geometry: &Geometry,
    ) -> Result<Handle<Image>>
    where
        B: Kernels,
    {
        let estimate = SourceEstimate {
            label: "taa",
            source: color,
        }
        .record(graph, geometry)?;

        self.denoiser().record(
            graph, backend, history, camera, estimate, geometry, geometry,
        )
    }

    fn denoiser(&self) -> TemporalDenoiser {
        TemporalDenoiser {
            label: "taa",
            effect: EffectTag::Taa,
            temporal: true,
            policy: self.config.accumulation(),
            bilateral: None,
            upsample: DenoiseConfig::default().upsample(),
            history: HistoryPlacement::Working,
        }
    }
}

fn halton(mut idx: u32, base: u32) -> f32 {
    let mut fraction = 1.0;
    let mut result = 0.0;

    while idx > 0 {
        fraction /= base as f32;
        result += fraction * (idx % base) as f32;
        idx /= base;
    }

    result
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::uvec2;

    use super::*;

    #[test]
    fn halton_sequence() {
        let actual: Vec<_> = (1..=4).map(|idx| halton(idx, 2)).collect();

        assert_eq!(vec![0.5, 0.25, 0.75, 0.125], actual);
        assert_relative_eq!(1.0 / 3.0, halton(1, 3));
        assert_relative_eq!(2.0 / 3.0, halton(2, 3));
        assert_relative_eq!(1.0 / 9.0, halton(3, 3));
    }

    #[test]
    fn jitter() {
        let size = uvec2(100, 50);

        for frame in 0..Taa::JITTER_PERIOD {
            let offset = Taa::jitter(frame, size) * size.as_vec2();

            assert!(offset.x.abs() <= 0.5, "frame {frame}: {offset}");
            assert!(offset.y.abs() <= 0.5, "frame {frame}: {offset}");
        }

        assert_eq!(
            Taa::jitter(3, size),
            Taa::jitter(3 + Taa::JITTER_PERIOD, size)
        );

        assert_ne!(Taa::jitter(0, size), Taa::jitter(1, size));
    }
}
