use derivative::Derivative;
use glam::UVec2;
use log::debug;

use crate::effects::{Geometry, SourceEstimate, Ssao, Ssgi, Taa};
use crate::{
    Backend, CameraHandle, EffectTag, FrameGraph, Handle, HistoryCache,
    Image, Kernels, Result, SsaoConfig, SsgiConfig, TaaConfig,
};

/// Images of a view, as imported into the frame graph by the host.
#[derive(Clone, Copy, Debug)]
pub struct ViewInputs {
    pub camera: CameraHandle,
    pub size: UVec2,

    /// Scene color, required for anti-aliasing
    pub color: Option<Handle<Image>>,

    pub depth: Handle<Image>,
    pub normal: Handle<Image>,

    /// Per-pixel displacement since the previous frame, in UV units; without
    /// it all effects run without temporal accumulation
    pub motion: Option<Handle<Image>>,

    /// Indirect lighting traced by the host, required for SSGI
    pub irradiance: Option<Handle<Image>>,
}

/// Final images of the effects recorded for a view; `None` when given effect
/// is disabled (or lacks its input).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EffectOutputs {
    pub taa: Option<Handle<Image>>,
    pub ambient_occlusion: Option<Handle<Image>>,
    pub irradiance: Option<Handle<Image>>,
}

/// Per-renderer context: owns configuration of the effects and their
/// histories.
///
/// Usage, each frame:
///
/// - [`Self::begin_frame()`],
/// - [`Self::record()`] for each camera, into the frame's graph,
/// - compile and execute the graph,
/// - [`Self::end_frame()`].
#[derive(Derivative)]
#[derivative(Debug(bound = ""), Default(bound = ""))]
pub struct ScreenEffects<B>
where
    B: Backend,
{
    pub taa: TaaConfig,
    pub ssao: SsaoConfig,
    pub ssgi: SsgiConfig,
    history: HistoryCache<B::Resource>,
}

impl<B> ScreenEffects<B>
where
    B: Kernels,
{
    pub fn new(taa: TaaConfig, ssao: SsaoConfig, ssgi: SsgiConfig) -> Self {
        Self {
            taa,
            ssao,
            ssgi,
            history: HistoryCache::new(),
        }
    }

    pub fn begin_frame(&mut self, frame: u64) {
        self.history.begin_frame(frame);
    }

    /// Records enabled effects of given view; histories of disabled effects
    /// are released.
    pub fn record(
        &mut self,
        backend: &mut B,
        graph: &mut FrameGraph<B>,
        view: &ViewInputs,
    ) -> Result<EffectOutputs> {
        let camera = view.camera;
        let frame = self.history.frame();

        let full = Geometry {
            size: view.size,
            depth: view.depth,
            normal: view.normal,
            motion: view.motion,
        };

        let taa = Taa::new(&self.taa);
        let ssao = Ssao::new(&self.ssao);
        let ssgi = Ssgi::new(&self.ssgi);

        let color = view.color.filter(|_| self.taa.enabled);
        let ssao_enabled = ssao.config().effect.enabled;

        let irradiance = view
            .irradiance
            .filter(|_| ssgi.config().effect.enabled);

        let ssao_half = ssao_enabled
            && ssao.config().effect.denoise.half_resolution;

        let ssgi_half = irradiance.is_some()
            && ssgi.config().effect.denoise.half_resolution;

        let half = if ssao_half || ssgi_half {
            Some(full.downsample(graph)?)
        } else {
            None
        };

        let pick = |half_res: bool| match half {
            Some(half) if half_res => half,
            _ => full,
        };

        let mut outputs = EffectOutputs::default();

        if let Some(color) = color {
            outputs.taa = Some(taa.record(
                graph,
                backend,
                &mut self.history,
                camera,
                color,
                &full,
            )?);
        } else {
            self.skip(backend, camera, EffectTag::Taa);
        }

        if ssao_enabled {
            outputs.ambient_occlusion = Some(ssao.record(
                graph,
                backend,
                &mut self.history,
                camera,
                &full,
                &pick(ssao_half),
                frame as u32,
            )?);
        } else {
            self.skip(backend, camera, EffectTag::AmbientOcclusion);
        }

        if let Some(irradiance) = irradiance {
            let estimate = SourceEstimate {
                label: "ssgi",
                source: irradiance,
            };

            outputs.irradiance = Some(ssgi.record(
                graph,
                backend,
                &mut self.history,
                camera,
                &estimate,
                &full,
                &pick(ssgi_half),
            )?);
        } else {
            self.skip(backend, camera, EffectTag::Irradiance);
        }

        Ok(outputs)
    }

    /// Evicts histories not requested during this frame.
    pub fn end_frame(&mut self, backend: &mut B) {
        self.history.end_frame(backend);
    }

    /// Releases all histories of given camera; returns how many got released.
    pub fn remove_camera(
        &mut self,
        backend: &mut B,
        camera: CameraHandle,
    ) -> usize {
        self.history.release_camera(backend, camera)
    }

    pub fn history(&self) -> &HistoryCache<B::Resource> {
        &self.history
    }

    fn skip(
        &mut self,
        backend: &mut B,
        camera: CameraHandle,
        effect: EffectTag,
    ) {
        if self.history.release(backend, camera, effect) {
            debug!("{}: disabled for camera {:?}", effect.name(), camera);
        }
    }
}
