use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::UVec2;

/// Marker of handles pointing at images.
#[derive(Clone, Copy, Debug)]
pub enum Image {}

/// Marker of handles pointing at structured buffers.
#[derive(Clone, Copy, Debug)]
pub enum Buffer {}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct GraphId(u64);

impl GraphId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);

        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Index of a resource within its graph's table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub(crate) usize);

impl ResourceId {
    pub fn get(self) -> usize {
        self.0
    }
}

/// Typed reference to a resource of a frame graph.
///
/// Handles are valid only within the graph that created them (and only for
/// that frame); using a handle with another graph is reported as
/// [`crate::Error::ForeignHandle`].
pub struct Handle<T> {
    pub(crate) graph: GraphId,
    pub(crate) id: ResourceId,
    _kind: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub(crate) fn new(graph: GraphId, id: ResourceId) -> Self {
        Self {
            graph,
            id,
            _kind: PhantomData,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.graph == other.graph && self.id == other.id
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.graph.hash(state);
        self.id.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}:{})", self.graph.0, self.id.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageDesc {
    pub size: UVec2,
    pub format: wgpu::TextureFormat,
    pub usage: wgpu::TextureUsages,
}

impl ImageDesc {
    /// Creates a description of an image that can be both sampled and written
    /// by compute kernels.
    pub fn new(size: UVec2, format: wgpu::TextureFormat) -> Self {
        Self {
            size,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::STORAGE_BINDING,
        }
    }

    pub fn with_size(self, size: UVec2) -> Self {
        Self { size, ..self }
    }

    pub fn with_format(self, format: wgpu::TextureFormat) -> Self {
        Self { format, ..self }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferDesc {
    pub size: u64,
    pub usage: wgpu::BufferUsages,
}

impl BufferDesc {
    pub fn new(size: u64) -> Self {
        Self {
            size,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceDesc {
    Image(ImageDesc),
    Buffer(BufferDesc),
}

impl ResourceDesc {
    pub fn as_image(&self) -> Option<&ImageDesc> {
        match self {
            ResourceDesc::Image(desc) => Some(desc),
            ResourceDesc::Buffer(_) => None,
        }
    }

    pub fn as_buffer(&self) -> Option<&BufferDesc> {
        match self {
            ResourceDesc::Image(_) => None,
            ResourceDesc::Buffer(desc) => Some(desc),
        }
    }
}

impl From<ImageDesc> for ResourceDesc {
    fn from(desc: ImageDesc) -> Self {
        ResourceDesc::Image(desc)
    }
}

impl From<BufferDesc> for ResourceDesc {
    fn from(desc: BufferDesc) -> Self {
        ResourceDesc::Buffer(desc)
    }
}

/// How a resource enters the graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// Created by the graph, lives between its first and last use within the
    /// frame; its physical memory may be shared with other transients.
    Transient,

    /// Owned by the caller (e.g. the swapchain image or the depth buffer).
    Imported,

    /// Owned by the history cache, survives across frames.
    Persistent,
}

impl Lifetime {
    pub fn is_external(self) -> bool {
        !matches!(self, Lifetime::Transient)
    }
}

#[derive(Clone, Debug)]
pub(crate) struct ResourceEntry<R> {
    pub name: String,
    pub desc: ResourceDesc,
    pub lifetime: Lifetime,
    pub external: Option<R>,
}
