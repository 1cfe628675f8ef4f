use afterimage_gpu::SsaoParams;

use super::{
    EstimatePass, Geometry, HistoryPlacement, SsaoEstimate, TemporalDenoiser,
};
use crate::{
    CameraHandle, EffectTag, FrameGraph, Handle, HistoryCache, Image,
    Kernels, Result, SsaoConfig,
};

/// Screen-space ambient occlusion.
#[derive(Clone, Debug)]
pub struct Ssao {
    config: SsaoConfig,
}

impl Ssao {
    pub fn new(config: &SsaoConfig) -> Self {
        Self {
            config: config.sanitized(),
        }
    }

    pub fn config(&self) -> &SsaoConfig {
        &self.config
    }

    /// Records ambient occlusion estimated at the resolution of `low` and
    /// reconstructed at the resolution of `full`; the returned image holds
    /// the visibility (`1.0` = unoccluded) in its `xyz`.
    #[allow(clippy::too_many_arguments)]
    pub fn record<B>(
        &self,
        graph: &mut FrameGraph<B>,
        backend: &mut B,
        history: &mut HistoryCache<B::Resource>,
        camera: CameraHandle,
        full: &Geometry,
        low: &Geometry,
        frame: u32,
    ) -> Result<Handle<Image>>
    where
        B: Kernels,
    {
        let estimate = SsaoEstimate {
            params: self.params(full, low, frame),
        }
        .record(graph, low)?;

        self.denoiser()
            .record(graph, backend, history, camera, estimate, low, full)
    }

    fn params(
        &self,
        full: &Geometry,
        low: &Geometry,
        frame: u32,
    ) -> SsaoParams {
        let scale = low.size.x as f32 / full.size.x.max(1) as f32;

        SsaoParams {
            radius: self.config.radius * scale,
            samples: self.config.samples,
            bias: self.config.bias,
            intensity: self.config.intensity,
            max_distance: self.config.max_distance,
            frame,
        }
    }

    fn denoiser(&self) -> TemporalDenoiser {
        let effect = &self.config.effect;

        TemporalDenoiser {
            label: "ssao",
            effect: EffectTag::AmbientOcclusion,
            temporal: effect.temporal,
            policy: effect.denoise.accumulation(),
            bilateral: effect.bilateral.then(|| effect.denoise.bilateral()),
            upsample: effect.denoise.upsample(),
            history: HistoryPlacement::Working,
        }
    }
}
