//! Reference backend, running kernels on the CPU.
//!
//! It's slow, but it's deterministic and doesn't need a GPU, which makes it
//! the backend of choice for tests; it's also handy for debugging, since
//! images can be dumped into PNGs at any point.

use std::cell::{Ref, RefCell, RefMut};
use std::path::Path;
use std::rc::Rc;

use afterimage_gpu::{
    Accumulation, Accumulator, AverageDownsampler, Axis, BilateralFilter,
    BilateralParams, ClosestDownsampler, JointBilateralUpsampler, Reprojector,
    SsaoEstimator, SsaoParams, SurfaceMap, Tex, UpsampleParams,
};
use bytemuck::Pod;
use glam::{uvec2, UVec2, Vec4, Vec4Swizzles};
use log::trace;

use crate::{Backend, Error, Kernels, ResourceDesc, Result};

#[derive(Clone, Debug, PartialEq)]
pub struct CpuImage {
    label: String,
    size: UVec2,
    format: wgpu::TextureFormat,
    texels: Vec<Vec4>,
}

impl CpuImage {
    pub fn new(
        label: impl ToString,
        size: UVec2,
        format: wgpu::TextureFormat,
    ) -> Self {
        Self::from_fn(label, size, format, |_| Vec4::ZERO)
    }

    pub fn from_fn(
        label: impl ToString,
        size: UVec2,
        format: wgpu::TextureFormat,
        mut f: impl FnMut(UVec2) -> Vec4,
    ) -> Self {
        let mut texels = Vec::with_capacity((size.x * size.y) as usize);

        for y in 0..size.y {
            for x in 0..size.x {
                texels.push(mask(format, f(uvec2(x, y))));
            }
        }

        Self {
            label: label.to_string(),
            size,
            format,
            texels,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn texels(&self) -> &[Vec4] {
        &self.texels
    }

    pub fn get(&self, pos: UVec2) -> Vec4 {
        self.texels[self.index(pos)]
    }

    pub fn set(&mut self, pos: UVec2, value: Vec4) {
        let idx = self.index(pos);

        self.texels[idx] = mask(self.format, value);
    }

    /// Converts this image into 8-bit RGBA, clamping channels to `<0, 1>`.
    pub fn to_image(&self) -> image::RgbaImage {
        let opaque = channels(self.format) < 4;

        image::RgbaImage::from_fn(self.size.x, self.size.y, |x, y| {
            let texel = self.get(uvec2(x, y));
            let texel = if opaque { texel.xyz().extend(1.0) } else { texel };
            let texel = (texel.clamp(Vec4::ZERO, Vec4::ONE) * 255.0).round();

            image::Rgba(texel.to_array().map(|channel| channel as u8))
        })
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        trace!("Saving image `{}` into {}", self.label, path.display());

        self.to_image()
            .save_with_format(path, image::ImageFormat::Png)?;

        Ok(())
    }

    fn replace(&mut self, texels: Vec<Vec4>) {
        self.texels = texels
            .into_iter()
            .map(|texel| mask(self.format, texel))
            .collect();
    }

    fn index(&self, pos: UVec2) -> usize {
        (pos.y * self.size.x + pos.x) as usize
    }
}

impl Tex for CpuImage {
    fn size(&self) -> UVec2 {
        self.size
    }

    fn read(&self, pos: UVec2) -> Vec4 {
        self.get(pos)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CpuBuffer {
    label: String,
    data: Vec<u8>,
}

impl CpuBuffer {
    pub fn new(label: impl ToString, size: usize) -> Self {
        Self {
            label: label.to_string(),
            data: vec![0; size],
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Reads `idx`-th item of type `T`; returns `None` if the buffer is too
    /// short.
    pub fn read<T>(&self, idx: usize) -> Option<T>
    where
        T: Pod,
    {
        let size = std::mem::size_of::<T>();
        let bytes = self.data.get(idx * size..(idx + 1) * size)?;

        Some(bytemuck::pod_read_unaligned(bytes))
    }

    /// Writes `idx`-th item of type `T`; returns `false` if the buffer is too
    /// short.
    pub fn write<T>(&mut self, idx: usize, item: T) -> bool
    where
        T: Pod,
    {
        let size = std::mem::size_of::<T>();

        if let Some(bytes) = self.data.get_mut(idx * size..(idx + 1) * size) {
            bytes.copy_from_slice(bytemuck::bytes_of(&item));
            true
        } else {
            false
        }
    }
}

#[derive(Clone, Debug)]
pub enum CpuResource {
    Image(Rc<RefCell<CpuImage>>),
    Buffer(Rc<RefCell<CpuBuffer>>),
}

impl CpuResource {
    pub fn image(&self) -> Result<Ref<'_, CpuImage>> {
        match self {
            CpuResource::Image(image) => Ok(image.borrow()),
            CpuResource::Buffer(_) => Err(self.wrong_kind()),
        }
    }

    pub fn image_mut(&self) -> Result<RefMut<'_, CpuImage>> {
        match self {
            CpuResource::Image(image) => Ok(image.borrow_mut()),
            CpuResource::Buffer(_) => Err(self.wrong_kind()),
        }
    }

    pub fn buffer(&self) -> Result<Ref<'_, CpuBuffer>> {
        match self {
            CpuResource::Image(_) => Err(self.wrong_kind()),
            CpuResource::Buffer(buffer) => Ok(buffer.borrow()),
        }
    }

    pub fn buffer_mut(&self) -> Result<RefMut<'_, CpuBuffer>> {
        match self {
            CpuResource::Image(_) => Err(self.wrong_kind()),
            CpuResource::Buffer(buffer) => Ok(buffer.borrow_mut()),
        }
    }

    pub fn label(&self) -> String {
        match self {
            CpuResource::Image(image) => image.borrow().label.clone(),
            CpuResource::Buffer(buffer) => buffer.borrow().label.clone(),
        }
    }

    /// Returns whether both resources point at the same memory.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CpuResource::Image(a), CpuResource::Image(b)) => Rc::ptr_eq(a, b),
            (CpuResource::Buffer(a), CpuResource::Buffer(b)) => {
                Rc::ptr_eq(a, b)
            }
            _ => false,
        }
    }

    fn wrong_kind(&self) -> Error {
        Error::WrongResourceKind {
            resource: self.label(),
        }
    }
}

impl From<CpuImage> for CpuResource {
    fn from(image: CpuImage) -> Self {
        CpuResource::Image(Rc::new(RefCell::new(image)))
    }
}

impl From<CpuBuffer> for CpuResource {
    fn from(buffer: CpuBuffer) -> Self {
        CpuResource::Buffer(Rc::new(RefCell::new(buffer)))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocationStats {
    /// Number of `allocate()` calls so far
    pub allocations: usize,

    /// Number of `release()` calls so far
    pub releases: usize,

    /// Number of resources allocated at once, at most
    pub peak: usize,
}

impl AllocationStats {
    pub fn live(&self) -> usize {
        self.allocations - self.releases
    }
}

#[derive(Debug, Default)]
pub struct CpuBackend {
    stats: AllocationStats,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> AllocationStats {
        self.stats
    }
}

impl Backend for CpuBackend {
    type Resource = CpuResource;

    fn allocate(
        &mut self,
        label: &str,
        desc: &ResourceDesc,
    ) -> Result<Self::Resource> {
        trace!("Allocating `{label}`: {desc:?}");

        self.stats.allocations += 1;
        self.stats.peak = self.stats.peak.max(self.stats.live());

        Ok(match desc {
            ResourceDesc::Image(desc) => {
                CpuImage::new(label, desc.size, desc.format).into()
            }
            ResourceDesc::Buffer(desc) => {
                CpuBuffer::new(label, desc.size as usize).into()
            }
        })
    }

    fn release(&mut self, resource: Self::Resource) {
        trace!("Releasing `{}`", resource.label());

        self.stats.releases += 1;
    }
}

impl Kernels for CpuBackend {
    fn copy(
        &mut self,
        input: &Self::Resource,
        output: &Self::Resource,
    ) -> Result<()> {
        let texels = {
            let input = input.image()?;

            expect_size(&*output.image()?, input.size())?;
            render(output, |pos| input.read(pos))?
        };

        output.image_mut()?.replace(texels);

        Ok(())
    }

    fn seed_history(
        &mut self,
        estimate: &Self::Resource,
        history: &Self::Resource,
    ) -> Result<()> {
        let texels = {
            let estimate = estimate.image()?;

            expect_size(&*history.image()?, estimate.size())?;
            render(history, |pos| estimate.read(pos).xyz().extend(1.0))?
        };

        history.image_mut()?.replace(texels);

        Ok(())
    }

    fn downsample_average(
        &mut self,
        input: &Self::Resource,
        output: &Self::Resource,
    ) -> Result<()> {
        let texels = {
            let input = input.image()?;

            let downsampler = AverageDownsampler {
                input: &*input,
                output_size: output.image()?.size(),
            };

            render(output, |pos| downsampler.run(pos))?
        };

        output.image_mut()?.replace(texels);

        Ok(())
    }

    fn downsample_closest(
        &mut self,
        depth: &Self::Resource,
        input: &Self::Resource,
        output: &Self::Resource,
    ) -> Result<()> {
        let texels = {
            let depth = depth.image()?;
            let input = input.image()?;

            expect_size(&*input, depth.size())?;

            let downsampler = ClosestDownsampler {
                depth: &*depth,
                output_size: output.image()?.size(),
            };

            render(output, |pos| input.read(downsampler.run(pos)))?
        };

        output.image_mut()?.replace(texels);

        Ok(())
    }

    fn reproject(
        &mut self,
        history: &Self::Resource,
        motion: &Self::Resource,
        output: &Self::Resource,
    ) -> Result<()> {
        let texels = {
            let history = history.image()?;
            let motion = motion.image()?;

            expect_size(&*output.image()?, motion.size())?;

            let reprojector = Reprojector {
                history: &*history,
                motion: &*motion,
            };

            render(output, |pos| reprojector.run(pos))?
        };

        output.image_mut()?.replace(texels);

        Ok(())
    }

    fn accumulate(
        &mut self,
        estimate: &Self::Resource,
        warped: &Self::Resource,
        output: &Self::Resource,
        policy: Accumulation,
    ) -> Result<()> {
        let texels = {
            let estimate = estimate.image()?;
            let warped = warped.image()?;

            expect_size(&*warped, estimate.size())?;
            expect_size(&*output.image()?, estimate.size())?;

            let accumulator = Accumulator {
                estimate: &*estimate,
                history: &*warped,
                policy,
            };

            render(output, |pos| accumulator.run(pos))?
        };

        output.image_mut()?.replace(texels);

        Ok(())
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
        let texels = {
            let input = input.image()?;
            let depth = depth.image()?;
            let normal = normal.image()?;

            expect_size(&*depth, input.size())?;
            expect_size(&*normal, input.size())?;
            expect_size(&*output.image()?, input.size())?;

            let filter = BilateralFilter {
                input: &*input,
                surfaces: SurfaceMap::new(&*depth, &*normal),
                params,
                axis,
            };

            render(output, |pos| filter.run(pos))?
        };

        output.image_mut()?.replace(texels);

        Ok(())
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
        let texels = {
            let input = input.image()?;
            let low_depth = low_depth.image()?;
            let low_normal = low_normal.image()?;
            let high_depth = high_depth.image()?;
            let high_normal = high_normal.image()?;

            expect_size(&*low_depth, input.size())?;
            expect_size(&*low_normal, input.size())?;
            expect_size(&*high_normal, high_depth.size())?;
            expect_size(&*output.image()?, high_depth.size())?;

            let upsampler = JointBilateralUpsampler {
                input: &*input,
                low_surfaces: SurfaceMap::new(&*low_depth, &*low_normal),
                high_surfaces: SurfaceMap::new(&*high_depth, &*high_normal),
                params,
            };

            render(output, |pos| upsampler.run(pos))?
        };

        output.image_mut()?.replace(texels);

        Ok(())
    }

    fn ssao(
        &mut self,
        depth: &Self::Resource,
        normal: &Self::Resource,
        output: &Self::Resource,
        params: SsaoParams,
    ) -> Result<()> {
        let texels = {
            let depth = depth.image()?;
            let normal = normal.image()?;

            expect_size(&*normal, depth.size())?;
            expect_size(&*output.image()?, depth.size())?;

            let estimator = SsaoEstimator {
                surfaces: SurfaceMap::new(&*depth, &*normal),
                params,
            };

            render(output, |pos| estimator.run(pos))?
        };

        output.image_mut()?.replace(texels);

        Ok(())
    }
}

/// Evaluates `f` for each texel of `output`, without writing anything yet (so
/// that `output` can be one of the inputs as well).
fn render(
    output: &CpuResource,
    f: impl Fn(UVec2) -> Vec4,
) -> Result<Vec<Vec4>> {
    let size = output.image()?.size();
    let mut texels = Vec::with_capacity((size.x * size.y) as usize);

    for y in 0..size.y {
        for x in 0..size.x {
            texels.push(f(uvec2(x, y)));
        }
    }

    Ok(texels)
}

fn expect_size(image: &CpuImage, expected: UVec2) -> Result<()> {
    if image.size() == expected {
        Ok(())
    } else {
        Err(Error::SizeMismatch {
            expected,
            actual: image.size(),
        })
    }
}

/// Returns the number of channels images of given format have.
fn channels(format: wgpu::TextureFormat) -> usize {
    use wgpu::TextureFormat as F;

    match format {
        F::R8Unorm | F::R16Float | F::R32Float | F::Depth32Float => 1,
        F::Rg8Unorm | F::Rg16Float | F::Rg32Float => 2,
        _ => 4,
    }
}

/// Zeroes channels that images of given format don't have.
fn mask(format: wgpu::TextureFormat, texel: Vec4) -> Vec4 {
    match channels(format) {
        1 => Vec4::new(texel.x, 0.0, 0.0, 0.0),
        2 => Vec4::new(texel.x, texel.y, 0.0, 0.0),
        _ => texel,
    }
}
