use afterimage_gpu::{
    half_size, Accumulation, Axis, BilateralParams, UpsampleParams,
};
use glam::UVec2;
use log::debug;

use crate::{
    CameraHandle, EffectTag, FrameGraph, Handle, HistoryCache, Image,
    ImageDesc, Kernels, Result,
};

/// Format of estimates, histories and everything in between.
pub const SIGNAL_FORMAT: wgpu::TextureFormat =
    wgpu::TextureFormat::Rgba16Float;

/// Depth, normals and motion of a view, at some resolution.
#[derive(Clone, Copy, Debug)]
pub struct Geometry {
    pub size: UVec2,
    pub depth: Handle<Image>,
    pub normal: Handle<Image>,
    pub motion: Option<Handle<Image>>,
}

impl Geometry {
    /// Records a pass producing the half-resolution counterpart of this
    /// geometry; each output texel is copied from the closest texel of its
    /// 2x2 footprint.
    pub fn downsample<B>(&self, graph: &mut FrameGraph<B>) -> Result<Self>
    where
        B: Kernels,
    {
        let size = half_size(self.size);
        let depth_desc = graph.image_desc(self.depth)?.with_size(size);
        let normal_desc = graph.image_desc(self.normal)?.with_size(size);

        let motion_desc = match self.motion {
            Some(motion) => Some(graph.image_desc(motion)?.with_size(size)),
            None => None,
        };

        let mut pass = graph.add_pass("downsample_geometry");
        let depth = pass.read(self.depth);
        let normal = pass.read(self.normal);
        let motion = self.motion.map(|motion| pass.read(motion));
        let half_depth = pass.create_image("half_depth", depth_desc);
        let half_normal = pass.create_image("half_normal", normal_desc);

        let half_motion =
            motion_desc.map(|desc| pass.create_image("half_motion", desc));

        pass.execute(move |ctx| {
            let depth = ctx.read(depth)?;
            let normal = ctx.read(normal)?;
            let half_depth = ctx.write(half_depth)?;
            let half_normal = ctx.write(half_normal)?;

            ctx.backend().downsample_closest(&depth, &depth, &half_depth)?;
            ctx.backend().downsample_closest(&depth, &normal, &half_normal)?;

            if let (Some(motion), Some(half_motion)) = (motion, half_motion) {
                let motion = ctx.read(motion)?;
                let half_motion = ctx.write(half_motion)?;

                ctx.backend()
                    .downsample_closest(&depth, &motion, &half_motion)?;
            }

            Ok(())
        });

        Ok(Self {
            size,
            depth: half_depth,
            normal: half_normal,
            motion: half_motion,
        })
    }
}

/// Where the history of a reduced-resolution effect lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HistoryPlacement {
    /// At the working resolution, before the spatial filter and the upsample.
    Working,

    /// At the output resolution: the upsampled image itself becomes the
    /// history, reprojected back into the working resolution next frame.
    Output,
}

/// Temporal accumulation, spatial filtering and reconstruction shared by all
/// effects.
///
/// The recorded chain is:
///
/// ```text
/// estimate -> seed / (reproject -> accumulate) -> bilateral -> upsample
/// ```
///
/// where the temporal part is skipped when it's disabled or when there are no
/// motion vectors, the bilateral part when there are no parameters for it and
/// the upsample when the estimate is already at the output resolution.
#[derive(Clone, Debug)]
pub struct TemporalDenoiser {
    /// Prefix of recorded passes and resources
    pub label: &'static str,

    pub effect: EffectTag,
    pub temporal: bool,
    pub policy: Accumulation,
    pub bilateral: Option<BilateralParams>,
    pub upsample: UpsampleParams,
    pub history: HistoryPlacement,
}

impl TemporalDenoiser {
    /// Records the chain for `estimate`, which has the resolution of `low`;
    /// returns the final image, at the resolution of `full`.
    #[allow(clippy::too_many_arguments)]
    pub fn record<B>(
        &self,
        graph: &mut FrameGraph<B>,
        backend: &mut B,
        history: &mut HistoryCache<B::Resource>,
        camera: CameraHandle,
        estimate: Handle<Image>,
        low: &Geometry,
        full: &Geometry,
    ) -> Result<Handle<Image>>
    where
        B: Kernels,
    {
        let label = self.label;
        let low_desc = ImageDesc::new(low.size, SIGNAL_FORMAT);
        let full_desc = ImageDesc::new(full.size, SIGNAL_FORMAT);

        let upsampled = low.size != full.size;
        let fused = upsampled && self.history == HistoryPlacement::Output;

        let motion = if self.temporal {
            if low.motion.is_none() {
                debug!("{label}: no motion vectors, accumulation disabled");
            }

            low.motion
        } else {
            None
        };

        let mut signal = estimate;
        let mut output = None;

        if let Some(motion) = motion {
            let desc = if fused { full_desc } else { low_desc };

            let (slot, fresh) =
                history.get_or_create(backend, camera, self.effect, desc)?;

            let prev = graph.import_history(format!("{label}_history"), &slot);

            let accumulated = if fused {
                output = Some(prev);
                graph.create_image(format!("{label}_accumulated"), low_desc)
            } else {
                prev
            };

            if fresh {
                debug!("{label}: history is fresh, seeding");

                self.seed(graph, estimate, accumulated);
            } else {
                let warped = self.reproject(graph, prev, motion, low_desc);

                self.accumulate(graph, estimate, warped, accumulated);
            }

            signal = accumulated;
        } else {
            history.release(backend, camera, self.effect);
        }

        if let Some(params) = self.bilateral {
            signal = self.denoise(graph, signal, low, params, low_desc);
        }

        if upsampled {
            let output = output.unwrap_or_else(|| {
                graph.create_image(format!("{label}_upsampled"), full_desc)
            });

            self.upsample(graph, signal, low, full, output);
            signal = output;
        }

        Ok(signal)
    }

    fn seed<B>(
        &self,
        graph: &mut FrameGraph<B>,
        estimate: Handle<Image>,
        target: Handle<Image>,
    ) where
        B: Kernels,
    {
        let mut pass = graph.add_pass(format!("{}_seed", self.label));
        let estimate = pass.read(estimate);
        let target = pass.write(target);

        pass.execute(move |ctx| {
            let estimate = ctx.read(estimate)?;
            let target = ctx.write(target)?;

            ctx.backend().seed_history(&estimate, &target)
        });
    }

    fn reproject<B>(
        &self,
        graph: &mut FrameGraph<B>,
        history: Handle<Image>,
        motion: Handle<Image>,
        desc: ImageDesc,
    ) -> Handle<Image>
    where
        B: Kernels,
    {
        let mut pass = graph.add_pass(format!("{}_reproject", self.label));
        let history = pass.read(history);
        let motion = pass.read(motion);
        let warped = pass.create_image(format!("{}_warped", self.label), desc);

        pass.execute(move |ctx| {
            let history = ctx.read(history)?;
            let motion = ctx.read(motion)?;
            let warped = ctx.write(warped)?;

            ctx.backend().reproject(&history, &motion, &warped)
        });

        warped
    }

    fn accumulate<B>(
        &self,
        graph: &mut FrameGraph<B>,
        estimate: Handle<Image>,
        warped: Handle<Image>,
        target: Handle<Image>,
    ) where
        B: Kernels,
    {
        let policy = self.policy;
        let mut pass = graph.add_pass(format!("{}_accumulate", self.label));
        let estimate = pass.read(estimate);
        let warped = pass.read(warped);
        let target = pass.write(target);

        pass.execute(move |ctx| {
            let estimate = ctx.read(estimate)?;
            let warped = ctx.read(warped)?;
            let target = ctx.write(target)?;

            ctx.backend().accumulate(&estimate, &warped, &target, policy)
        });
    }

    fn denoise<B>(
        &self,
        graph: &mut FrameGraph<B>,
        input: Handle<Image>,
        geometry: &Geometry,
        params: BilateralParams,
        desc: ImageDesc,
    ) -> Handle<Image>
    where
        B: Kernels,
    {
        let horizontal = self.bilateral_pass(
            graph,
            input,
            geometry,
            params,
            Axis::Horizontal,
            desc,
        );

        self.bilateral_pass(
            graph,
            horizontal,
            geometry,
            params,
            Axis::Vertical,
            desc,
        )
    }

    fn bilateral_pass<B>(
        &self,
        graph: &mut FrameGraph<B>,
        input: Handle<Image>,
        geometry: &Geometry,
        params: BilateralParams,
        axis: Axis,
        desc: ImageDesc,
    ) -> Handle<Image>
    where
        B: Kernels,
    {
        let suffix = match axis {
            Axis::Horizontal => "h",
            Axis::Vertical => "v",
        };

        let name = format!("{}_bilateral_{suffix}", self.label);
        let mut pass = graph.add_pass(&name);
        let input = pass.read(input);
        let depth = pass.read(geometry.depth);
        let normal = pass.read(geometry.normal);
        let output = pass.create_image(name, desc);

        pass.execute(move |ctx| {
            let input = ctx.read(input)?;
            let depth = ctx.read(depth)?;
            let normal = ctx.read(normal)?;
            let output = ctx.write(output)?;

            ctx.backend()
                .bilateral(&input, &depth, &normal, &output, params, axis)
        });

        output
    }

    fn upsample<B>(
        &self,
        graph: &mut FrameGraph<B>,
        input: Handle<Image>,
        low: &Geometry,
        full: &Geometry,
        output: Handle<Image>,
    ) where
        B: Kernels,
    {
        let params = self.upsample;
        let mut pass = graph.add_pass(format!("{}_upsample", self.label));
        let input = pass.read(input);
        let low_depth = pass.read(low.depth);
        let low_normal = pass.read(low.normal);
        let high_depth = pass.read(full.depth);
        let high_normal = pass.read(full.normal);
        let output = pass.write(output);

        pass.execute(move |ctx| {
            let input = ctx.read(input)?;
            let low_depth = ctx.read(low_depth)?;
            let low_normal = ctx.read(low_normal)?;
            let high_depth = ctx.read(high_depth)?;
            let high_normal = ctx.read(high_normal)?;
            let output = ctx.write(output)?;

            ctx.backend().upsample(
                &input,
                &low_depth,
                &low_normal,
                &high_depth,
                &high_normal,
                &output,
                params,
            )
        });
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use glam::{uvec2, Vec4};

    use super::*;
    use crate::backends::cpu::{CpuBackend, CpuImage, CpuResource};
    use crate::DenoiseConfig;

    const CAMERA: CameraHandle = CameraHandle(1);

    struct Target {
        backend: CpuBackend,
        history: HistoryCache<CpuResource>,
    }

    impl Target {
        fn new() -> Self {
            Self {
                backend: CpuBackend::new(),
                history: HistoryCache::new(),
            }
        }

        /// Records given denoiser over a constant estimate and returns the
        /// passes that got scheduled.
        fn run(
            &mut self,
            denoiser: &TemporalDenoiser,
            frame: u64,
            size: UVec2,
            half_res: bool,
        ) -> Vec<String> {
            use wgpu::TextureFormat as F;

            let mut graph = FrameGraph::<CpuBackend>::new();

            let mut import = |name: &str, format, value: Vec4| {
                let image = CpuImage::from_fn(name, size, format, |_| value);

                graph.import_image(
                    name,
                    image.into(),
                    ImageDesc::new(size, format),
                )
            };

            let depth = import("depth", F::R32Float, Vec4::ONE);
            let normal = import("normal", F::Rgba16Float, Vec4::Z);
            let motion = import("motion", F::Rg32Float, Vec4::ZERO);
            let estimate = import("estimate", SIGNAL_FORMAT, Vec4::splat(0.5));

            let full = Geometry {
                size,
                depth,
                normal,
                motion: Some(motion),
            };

            let low = if half_res {
                full.downsample(&mut graph).unwrap()
            } else {
                full
            };

            let estimate = if half_res {
                let mut pass = graph.add_pass("estimate_downsample");
                let input = pass.read(estimate);

                let output = pass.create_image(
                    "half_estimate",
                    ImageDesc::new(low.size, SIGNAL_FORMAT),
                );

                pass.execute(move |ctx| {
                    let input = ctx.read(input)?;
                    let output = ctx.write(output)?;

                    ctx.backend().downsample_average(&input, &output)
                });

                output
            } else {
                estimate
            };

            self.history.begin_frame(frame);

            let output = denoiser
                .record(
                    &mut graph,
                    &mut self.backend,
                    &mut self.history,
                    CAMERA,
                    estimate,
                    &low,
                    &full,
                )
                .unwrap();

            let mut pass = graph.add_pass("present");

            pass.read(output);
            pass.pin();
            pass.execute(|_| Ok(()));

            let report = graph.compile().unwrap().execute(&mut self.backend);

            self.history.end_frame(&mut self.backend);

            report.unwrap().executed
        }
    }

    fn denoiser(history: HistoryPlacement) -> TemporalDenoiser {
        let config = DenoiseConfig::default();

        TemporalDenoiser {
            label: "test",
            effect: EffectTag::Irradiance,
            temporal: true,
            policy: config.accumulation(),
            bilateral: Some(config.bilateral()),
            upsample: config.upsample(),
            history,
        }
    }

    #[test]
    fn full_resolution() {
        let mut target = Target::new();
        let denoiser = denoiser(HistoryPlacement::Working);

        assert_eq!(
            vec![
                "test_seed",
                "test_bilateral_h",
                "test_bilateral_v",
                "present"
            ],
            target.run(&denoiser, 0, uvec2(4, 4), false),
        );

        assert_eq!(
            vec![
                "test_reproject",
                "test_accumulate",
                "test_bilateral_h",
                "test_bilateral_v",
                "present"
            ],
            target.run(&denoiser, 1, uvec2(4, 4), false),
        );

        // Resizing starts from scratch
        assert_eq!(
            "test_seed",
            target.run(&denoiser, 2, uvec2(8, 8), false)[0],
        );
    }

    #[test]
    fn without_temporal_accumulation() {
        let mut target = Target::new();
        let mut denoiser = denoiser(HistoryPlacement::Working);

        target.run(&denoiser, 0, uvec2(4, 4), false);
        assert_eq!(1, target.history.len());

        denoiser.temporal = false;

        assert_eq!(
            vec!["test_bilateral_h", "test_bilateral_v", "present"],
            target.run(&denoiser, 1, uvec2(4, 4), false),
        );

        assert!(target.history.is_empty());
        assert_eq!(0, target.backend.stats().live());
    }

    #[test]
    fn history_at_working_resolution() {
        let mut target = Target::new();
        let denoiser = denoiser(HistoryPlacement::Working);

        target.run(&denoiser, 0, uvec2(8, 8), true);

        assert_eq!(
            vec![
                "downsample_geometry",
                "estimate_downsample",
                "test_reproject",
                "test_accumulate",
                "test_bilateral_h",
                "test_bilateral_v",
                "test_upsample",
                "present"
            ],
            target.run(&denoiser, 1, uvec2(8, 8), true),
        );

        let slot = target.history.get(CAMERA, EffectTag::Irradiance).unwrap();

        assert_eq!(uvec2(4, 4), slot.desc.size);
    }

    #[test]
    fn history_at_output_resolution() {
        let mut target = Target::new();
        let denoiser = denoiser(HistoryPlacement::Output);

        target.run(&denoiser, 0, uvec2(8, 8), true);
        target.run(&denoiser, 1, uvec2(8, 8), true);

        let slot = target.history.get(CAMERA, EffectTag::Irradiance).unwrap();

        assert_eq!(uvec2(8, 8), slot.desc.size);
        assert_eq!(0, slot.valid_since);

        // Constant input stays constant through the whole chain
        let history = slot.resource.image().unwrap();

        for texel in history.texels() {
            assert_abs_diff_eq!(0.5, texel.x, epsilon = 0.0001);
            assert_abs_diff_eq!(2.0, texel.w, epsilon = 0.0001);
        }
    }
}
