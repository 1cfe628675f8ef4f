use glam::UVec2;
use log::debug;

use super::Bindable;
use crate::ImageDesc;

#[derive(Debug)]
pub struct GpuTexture {
    label: String,
    desc: ImageDesc,
    tex: wgpu::Texture,
    tex_view: wgpu::TextureView,
}

impl GpuTexture {
    pub fn new(
        device: &wgpu::Device,
        label: impl AsRef<str>,
        desc: ImageDesc,
    ) -> Self {
        let label = label.as_ref();

        debug!(
            "Allocating texture `{label}`; size={:?}, format={:?}",
            desc.size, desc.format
        );

        let tex = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&format!("afterimage_{label}_tex")),
            size: wgpu::Extent3d {
                width: desc.size.x.max(1),
                height: desc.size.y.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage: desc.usage,
            view_formats: &[],
        });

        Self::from_texture(label, desc, tex)
    }

    /// Wraps a texture created outside of afterimage, e.g. the host's depth
    /// buffer.
    pub fn from_texture(
        label: impl ToString,
        desc: ImageDesc,
        tex: wgpu::Texture,
    ) -> Self {
        let tex_view = tex.create_view(&Default::default());

        Self {
            label: label.to_string(),
            desc,
            tex,
            tex_view,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn desc(&self) -> ImageDesc {
        self.desc
    }

    pub fn size(&self) -> UVec2 {
        self.desc.size
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.desc.format
    }

    pub fn tex(&self) -> &wgpu::Texture {
        &self.tex
    }

    pub fn readable(&self) -> ReadableTexture {
        ReadableTexture { parent: self }
    }

    pub fn writable(&self) -> WritableTexture {
        WritableTexture { parent: self }
    }
}

pub struct ReadableTexture<'a> {
    parent: &'a GpuTexture,
}

impl Bindable for ReadableTexture<'_> {
    fn bind(
        &self,
        binding: u32,
    ) -> Vec<(wgpu::BindGroupLayoutEntry, wgpu::BindingResource)> {
        let layout = wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Texture {
                multisampled: false,
                view_dimension: wgpu::TextureViewDimension::D2,
                sample_type: wgpu::TextureSampleType::Float {
                    filterable: false,
                },
            },
            count: None,
        };

        let resource =
            wgpu::BindingResource::TextureView(&self.parent.tex_view);

        vec![(layout, resource)]
    }
}

pub struct WritableTexture<'a> {
    parent: &'a GpuTexture,
}

impl Bindable for WritableTexture<'_> {
    fn bind(
        &self,
        binding: u32,
    ) -> Vec<(wgpu::BindGroupLayoutEntry, wgpu::BindingResource)> {
        let layout = wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::StorageTexture {
                access: wgpu::StorageTextureAccess::WriteOnly,
                format: self.parent.format(),
                view_dimension: wgpu::TextureViewDimension::D2,
            },
            count: None,
        };

        let resource =
            wgpu::BindingResource::TextureView(&self.parent.tex_view);

        vec![(layout, resource)]
    }
}
