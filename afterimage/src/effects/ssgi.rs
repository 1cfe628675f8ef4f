use super::{EstimatePass, Geometry, HistoryPlacement, TemporalDenoiser};
use crate::{
    CameraHandle, EffectTag, FrameGraph, Handle, HistoryCache, Image,
    Kernels, Result, SsgiConfig,
};

/// Denoising of indirect lighting traced (or otherwise estimated) by the
/// host.
///
/// At half resolution the history is the full-resolution output: next frame
/// it's reprojected straight into the half-resolution working image, so no
/// separate downsample of the history is needed.
#[derive(Clone, Debug)]
pub struct Ssgi {
    config: SsgiConfig,
}

impl Ssgi {
    pub fn new(config: &SsgiConfig) -> Self {
        Self {
            config: config.sanitized(),
        }
    }

    pub fn config(&self) -> &SsgiConfig {
        &self.config
    }

    #[allow(clippy::too_many_arguments)]
    pub fn record<B, E>(
        &self,
        graph: &mut FrameGraph<B>,
        backend: &mut B,
        history: &mut HistoryCache<B::Resource>,
        camera: CameraHandle,
        estimate: &E,
        full: &Geometry,
        low: &Geometry,
    ) -> Result<Handle<Image>>
    where
        B: Kernels,
        E: EstimatePass<B>,
    {
        let estimate = estimate.record(graph, low)?;

        self.denoiser()
            .record(graph, backend, history, camera, estimate, low, full)
    }

    fn denoiser(&self) -> TemporalDenoiser {
        let effect = &self.config.effect;

        TemporalDenoiser {
            label: "ssgi",
            effect: EffectTag::Irradiance,
            temporal: effect.temporal,
            policy: effect.denoise.accumulation(),
            bilateral: effect.bilateral.then(|| effect.denoise.bilateral()),
            upsample: effect.denoise.upsample(),
            history: HistoryPlacement::Output,
        }
    }
}
