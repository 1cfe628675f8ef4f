use log::debug;

use crate::{Error, Result};

const COMMON: &str = include_str!("shaders/common.wgsl");

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kernel {
    Copy,
    SeedHistory,
    DownsampleAverage,
    DownsampleClosest,
    Reproject,
    Accumulate,
    Bilateral,
    Upsample,
    Ssao,
}

impl Kernel {
    pub fn name(self) -> &'static str {
        match self {
            Kernel::Copy => "copy",
            Kernel::SeedHistory => "seed_history",
            Kernel::DownsampleAverage => "downsample_average",
            Kernel::DownsampleClosest => "downsample_closest",
            Kernel::Reproject => "reproject",
            Kernel::Accumulate => "accumulate",
            Kernel::Bilateral => "bilateral",
            Kernel::Upsample => "upsample",
            Kernel::Ssao => "ssao",
        }
    }

    fn source(self) -> &'static str {
        match self {
            Kernel::Copy => include_str!("shaders/copy.wgsl"),
            Kernel::SeedHistory => include_str!("shaders/seed_history.wgsl"),
            Kernel::DownsampleAverage => {
                include_str!("shaders/downsample_average.wgsl")
            }
            Kernel::DownsampleClosest => {
                include_str!("shaders/downsample_closest.wgsl")
            }
            Kernel::Reproject => include_str!("shaders/reproject.wgsl"),
            Kernel::Accumulate => include_str!("shaders/accumulate.wgsl"),
            Kernel::Bilateral => include_str!("shaders/bilateral.wgsl"),
            Kernel::Upsample => include_str!("shaders/upsample.wgsl"),
            Kernel::Ssao => include_str!("shaders/ssao.wgsl"),
        }
    }

    /// Returns the kernel's WGSL, specialized for writing images of given
    /// format.
    pub fn shader(self, format: wgpu::TextureFormat) -> Result<String> {
        let source = format!("{COMMON}\n{}", self.source());

        Ok(source.replace("{{FORMAT}}", storage_format(format)?))
    }
}

/// Compute pipeline of a kernel, specialized for one output format.
#[derive(Debug)]
pub struct KernelPipeline {
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline: wgpu::ComputePipeline,
}

impl KernelPipeline {
    pub fn new(
        device: &wgpu::Device,
        kernel: Kernel,
        format: wgpu::TextureFormat,
        entries: &[wgpu::BindGroupLayoutEntry],
    ) -> Result<Self> {
        debug!("Initializing pipeline: {}; format={format:?}", kernel.name());

        let label = format!("afterimage_{}", kernel.name());

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&label),
            source: wgpu::ShaderSource::Wgsl(kernel.shader(format)?.into()),
        });

        let bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(&format!("{label}_bg_layout")),
                entries,
            });

        let pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&format!("{label}_pipeline_layout")),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

        let pipeline =
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(&format!("{label}_pipeline")),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: "main",
            });

        Ok(Self {
            bind_group_layout,
            pipeline,
        })
    }

    pub fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout
    }

    pub fn pipeline(&self) -> &wgpu::ComputePipeline {
        &self.pipeline
    }
}

/// Returns the WGSL name of given storage-texture format.
pub fn storage_format(format: wgpu::TextureFormat) -> Result<&'static str> {
    use wgpu::TextureFormat as F;

    Ok(match format {
        F::Rgba8Unorm => "rgba8unorm",
        F::Rgba16Float => "rgba16float",
        F::Rgba32Float => "rgba32float",
        F::R32Float => "r32float",
        F::Rg32Float => "rg32float",
        format => return Err(Error::UnsupportedFormat(format)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shaders_are_specialized() {
        let shader = Kernel::Bilateral
            .shader(wgpu::TextureFormat::Rgba16Float)
            .unwrap();

        assert!(shader.contains("texture_storage_2d<rgba16float, write>"));
        assert!(shader.contains("fn is_similar("));
        assert!(!shader.contains("{{FORMAT}}"));
    }

    #[test]
    fn unsupported_formats() {
        assert!(matches!(
            Kernel::Copy.shader(wgpu::TextureFormat::Rg16Float),
            Err(Error::UnsupportedFormat(wgpu::TextureFormat::Rg16Float))
        ));
    }
}
