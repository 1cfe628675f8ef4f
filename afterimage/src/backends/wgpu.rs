//! Backend running kernels as wgpu compute shaders.
//!
//! Dispatches are recorded into a single command encoder which gets submitted
//! by [`WgpuBackend::submit()`], usually once per frame, after the graph has
//! been executed.

mod bind_group;
mod pipeline;
mod pool;
mod texture;

use std::collections::hash_map::Entry;
use std::sync::Arc;

use afterimage_gpu::{
    AccumulatePassParams, Accumulation, Axis, BilateralParams,
    BilateralPassParams, SsaoParams, SsaoPassParams, UpsampleParams,
    UpsamplePassParams,
};
use bytemuck::Pod;
use derivative::Derivative;
use fxhash::FxHashMap;
use log::{debug, trace};

pub use self::bind_group::*;
pub use self::pipeline::*;
pub use self::pool::*;
pub use self::texture::*;
use crate::{
    Backend, BufferDesc, Error, ImageDesc, Kernels, ResourceDesc, Result,
};

const WORKGROUP_SIZE: u32 = 8;

#[derive(Clone, Debug)]
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
}

impl GpuContext {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self { device, queue }
    }
}

#[derive(Debug)]
pub struct GpuBuffer {
    label: String,
    desc: BufferDesc,
    buffer: wgpu::Buffer,
}

impl GpuBuffer {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn desc(&self) -> BufferDesc {
        self.desc
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}

#[derive(Clone, Debug)]
pub enum GpuResource {
    Texture(Arc<GpuTexture>),
    Buffer(Arc<GpuBuffer>),
}

impl GpuResource {
    /// Wraps a texture created by the host, so that it can be imported into a
    /// graph.
    pub fn from_texture(
        label: impl ToString,
        desc: ImageDesc,
        tex: wgpu::Texture,
    ) -> Self {
        GpuResource::Texture(Arc::new(GpuTexture::from_texture(
            label, desc, tex,
        )))
    }

    pub fn texture(&self) -> Result<&GpuTexture> {
        match self {
            GpuResource::Texture(texture) => Ok(texture),
            GpuResource::Buffer(buffer) => Err(Error::WrongResourceKind {
                resource: buffer.label.clone(),
            }),
        }
    }

    pub fn buffer(&self) -> Result<&GpuBuffer> {
        match self {
            GpuResource::Texture(texture) => Err(Error::WrongResourceKind {
                resource: texture.label().to_owned(),
            }),
            GpuResource::Buffer(buffer) => Ok(buffer),
        }
    }

    fn label(&self) -> &str {
        match self {
            GpuResource::Texture(texture) => texture.label(),
            GpuResource::Buffer(buffer) => &buffer.label,
        }
    }
}

#[derive(Derivative)]
#[derivative(Debug)]
pub struct WgpuBackend {
    ctx: GpuContext,
    pool: ResourcePool,

    #[derivative(Debug = "ignore")]
    pipelines: FxHashMap<(Kernel, wgpu::TextureFormat), KernelPipeline>,

    #[derivative(Debug = "ignore")]
    encoder: Option<wgpu::CommandEncoder>,
}

impl WgpuBackend {
    pub fn new(ctx: GpuContext) -> Self {
        Self {
            ctx,
            pool: Default::default(),
            pipelines: Default::default(),
            encoder: None,
        }
    }

    pub fn context(&self) -> &GpuContext {
        &self.ctx
    }

    pub fn pool(&self) -> &ResourcePool {
        &self.pool
    }

    /// Drops idle pooled resources; worth calling after the viewport gets
    /// resized, since the pool then holds resources of the previous size.
    pub fn trim(&mut self) {
        self.pool.clear();
    }

    /// Submits everything dispatched so far.
    pub fn submit(&mut self) -> Option<wgpu::SubmissionIndex> {
        let encoder = self.encoder.take()?;

        trace!("Submitting commands");

        Some(self.ctx.queue.submit([encoder.finish()]))
    }

    fn dispatch<P>(
        &mut self,
        kernel: Kernel,
        inputs: &[&GpuResource],
        output: &GpuResource,
        params: Option<P>,
    ) -> Result<()>
    where
        P: Pod,
    {
        let output = output.texture()?;

        let inputs = inputs
            .iter()
            .map(|input| input.texture())
            .collect::<Result<Vec<_>>>()?;

        trace!(
            "Dispatching {}: {:?} -> `{}`",
            kernel.name(),
            inputs.iter().map(|input| input.label()).collect::<Vec<_>>(),
            output.label(),
        );

        let device = &self.ctx.device;
        let readables: Vec<_> =
            inputs.iter().map(|input| input.readable()).collect();
        let writable = output.writable();

        let params = params.map(|params| {
            UniformBuffer::new(
                device,
                format!("afterimage_{}_params", kernel.name()),
                &params,
            )
        });

        let mut bind_group = BindGroupBuilder::new(kernel.name());

        for readable in &readables {
            bind_group = bind_group.add(readable);
        }

        bind_group = bind_group.add(&writable);

        if let Some(params) = &params {
            bind_group = bind_group.add(params);
        }

        let pipeline = match self.pipelines.entry((kernel, output.format())) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(KernelPipeline::new(
                device,
                kernel,
                output.format(),
                bind_group.layouts(),
            )?),
        };

        let bind_group =
            bind_group.build(device, pipeline.bind_group_layout());

        let encoder = self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("afterimage_encoder"),
            })
        });

        let label = format!("afterimage_{}_pass", kernel.name());

        let mut pass =
            encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(&label),
                ..Default::default()
            });

        let size = output.size();

        pass.set_pipeline(pipeline.pipeline());
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(
            (size.x + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE,
            (size.y + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE,
            1,
        );

        Ok(())
    }
}

impl Backend for WgpuBackend {
    type Resource = GpuResource;

    fn allocate(
        &mut self,
        label: &str,
        desc: &ResourceDesc,
    ) -> Result<Self::Resource> {
        match desc {
            ResourceDesc::Image(desc) => {
                let texture = match self.pool.take_texture(desc) {
                    Some(texture) => {
                        trace!(
                            "Reusing texture `{}` as `{label}`",
                            texture.label()
                        );

                        texture
                    }
                    None => Arc::new(GpuTexture::new(
                        &self.ctx.device,
                        label,
                        *desc,
                    )),
                };

                Ok(GpuResource::Texture(texture))
            }

            ResourceDesc::Buffer(desc) => {
                let buffer = match self.pool.take_buffer(desc) {
                    Some(buffer) => buffer,
                    None => {
                        debug!(
                            "Allocating buffer `{label}`; size={}",
                            desc.size
                        );

                        let buffer = self.ctx.device.create_buffer(
                            &wgpu::BufferDescriptor {
                                label: Some(&format!("afterimage_{label}")),
                                size: desc.size,
                                usage: desc.usage,
                                mapped_at_creation: false,
                            },
                        );

                        Arc::new(GpuBuffer {
                            label: label.to_owned(),
                            desc: *desc,
                            buffer,
                        })
                    }
                };

                Ok(GpuResource::Buffer(buffer))
            }
        }
    }

    fn release(&mut self, resource: Self::Resource) {
        trace!("Returning `{}` to the pool", resource.label());

        match resource {
            GpuResource::Texture(texture) => self.pool.put_texture(texture),
            GpuResource::Buffer(buffer) => self.pool.put_buffer(buffer),
        }
    }
}

impl Kernels for WgpuBackend {
    fn copy(
        &mut self,
        input: &Self::Resource,
        output: &Self::Resource,
    ) -> Result<()> {
        expect_size(output, input.texture()?.size())?;

        self.dispatch::<()>(Kernel::Copy, &[input], output, None)
    }

    fn seed_history(
        &mut self,
        estimate: &Self::Resource,
        history: &Self::Resource,
    ) -> Result<()> {
        expect_size(history, estimate.texture()?.size())?;

        self.dispatch::<()>(Kernel::SeedHistory, &[estimate], history, None)
    }

    fn downsample_average(
        &mut self,
        input: &Self::Resource,
        output: &Self::Resource,
    ) -> Result<()> {
        self.dispatch::<()>(Kernel::DownsampleAverage, &[input], output, None)
    }

    fn downsample_closest(
        &mut self,
        depth: &Self::Resource,
        input: &Self::Resource,
        output: &Self::Resource,
    ) -> Result<()> {
        expect_size(input, depth.texture()?.size())?;

        self.dispatch::<()>(
            Kernel::DownsampleClosest,
            &[depth, input],
            output,
            None,
        )
    }

    fn reproject(
        &mut self,
        history: &Self::Resource,
        motion: &Self::Resource,
        output: &Self::Resource,
    ) -> Result<()> {
        expect_size(output, motion.texture()?.size())?;

        self.dispatch::<()>(Kernel::Reproject, &[history, motion], output, None)
    }

    fn accumulate(
        &mut self,
        estimate: &Self::Resource,
        warped: &Self::Resource,
        output: &Self::Resource,
        policy: Accumulation,
    ) -> Result<()> {
        let size = estimate.texture()?.size();

        expect_size(warped, size)?;
        expect_size(output, size)?;

        self.dispatch(
            Kernel::Accumulate,
            &[estimate, warped],
            output,
            Some(AccumulatePassParams::from(policy)),
        )
    }

    fn bilateral(
        &mut self,
        input: &Self::Resource,
        depth: &Self::Resource,
        normal: &Self::Resource,
        output: &Self::Resource,
        params: BilateralParams,
        axis: Axis,
    ) -> Result<()> {
        let size = input.texture()?.size();

        expect_size(depth, size)?;
        expect_size(normal, size)?;
        expect_size(output, size)?;

        self.dispatch(
            Kernel::Bilateral,
            &[input, depth, normal],
            output,
            Some(BilateralPassParams::new(params, axis)),
        )
    }

    fn upsample(
        &mut self,
        input: &Self::Resource,
        low_depth: &Self::Resource,
        low_normal: &Self::Resource,
        high_depth: &Self::Resource,
        high_normal: &Self::Resource,
        output: &Self::Resource,
        params: UpsampleParams,
    ) -> Result<()> {
        let low_size = input.texture()?.size();
        let high_size = high_depth.texture()?.size();

        expect_size(low_depth, low_size)?;
        expect_size(low_normal, low_size)?;
        expect_size(high_normal, high_size)?;
        expect_size(output, high_size)?;

        self.dispatch(
            Kernel::Upsample,
            &[input, low_depth, low_normal, high_depth, high_normal],
            output,
            Some(UpsamplePassParams::from(params)),
        )
    }

    fn ssao(
        &mut self,
        depth: &Self::Resource,
        normal: &Self::Resource,
        output: &Self::Resource,
        params: SsaoParams,
    ) -> Result<()> {
        let size = depth.texture()?.size();

        expect_size(normal, size)?;
        expect_size(output, size)?;

        self.dispatch(
            Kernel::Ssao,
            &[depth, normal],
            output,
            Some(SsaoPassParams::from(params)),
        )
    }
}

fn expect_size(resource: &GpuResource, expected: glam::UVec2) -> Result<()> {
    let actual = resource.texture()?.size();

    if actual == expected {
        Ok(())
    } else {
        Err(Error::SizeMismatch { expected, actual })
    }
}
