use afterimage_gpu::SsaoParams;

use super::{Geometry, SIGNAL_FORMAT};
use crate::{FrameGraph, Handle, Image, ImageDesc, Kernels, Result};

/// Something that produces a noisy, per-frame estimate of an effect.
pub trait EstimatePass<B>
where
    B: Kernels,
{
    /// Records passes producing the estimate at the resolution of `geometry`.
    fn record(
        &self,
        graph: &mut FrameGraph<B>,
        geometry: &Geometry,
    ) -> Result<Handle<Image>>;
}

/// Estimate computed outside of the graph (e.g. traced by the host), box
/// filtered down when it's larger than the working resolution.
#[derive(Clone, Copy, Debug)]
pub struct SourceEstimate {
    pub label: &'static str,
    pub source: Handle<Image>,
}

impl<B> EstimatePass<B> for SourceEstimate
where
    B: Kernels,
{
    fn record(
        &self,
        graph: &mut FrameGraph<B>,
        geometry: &Geometry,
    ) -> Result<Handle<Image>> {
        if graph.image_desc(self.source)?.size == geometry.size {
            return Ok(self.source);
        }

        let mut pass = graph.add_pass(format!("{}_downsample", self.label));
        let source = pass.read(self.source);

        let output = pass.create_image(
            format!("{}_estimate", self.label),
            ImageDesc::new(geometry.size, SIGNAL_FORMAT),
        );

        pass.execute(move |ctx| {
            let source = ctx.read(source)?;
            let output = ctx.write(output)?;

            ctx.backend().downsample_average(&source, &output)
        });

        Ok(output)
    }
}

/// Ambient occlusion traced against the depth buffer.
#[derive(Clone, Copy, Debug)]
pub struct SsaoEstimate {
    pub params: SsaoParams,
}

impl<B> EstimatePass<B> for SsaoEstimate
where
    B: Kernels,
{
    fn record(
        &self,
        graph: &mut FrameGraph<B>,
        geometry: &Geometry,
    ) -> Result<Handle<Image>> {
        let params = self.params;
        let mut pass = graph.add_pass("ssao_estimate");
        let depth = pass.read(geometry.depth);
        let normal = pass.read(geometry.normal);

        let output = pass.create_image(
            "ssao_estimate",
            ImageDesc::new(geometry.size, SIGNAL_FORMAT),
        );

        pass.execute(move |ctx| {
            let depth = ctx.read(depth)?;
            let normal = ctx.read(normal)?;
            let output = ctx.write(output)?;

            ctx.backend().ssao(&depth, &normal, &output, params)
        });

        Ok(output)
    }
}
