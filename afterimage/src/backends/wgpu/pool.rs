use std::sync::Arc;

use fxhash::FxHashMap;
use log::debug;

use super::{GpuBuffer, GpuTexture};
use crate::{BufferDesc, ImageDesc};

/// Idle textures and buffers, kept around so that the next frame (which
/// usually asks for exactly the same resources) doesn't have to allocate.
#[derive(Debug, Default)]
pub struct ResourcePool {
    textures: FxHashMap<ImageDesc, Vec<Arc<GpuTexture>>>,
    buffers: FxHashMap<BufferDesc, Vec<Arc<GpuBuffer>>>,
}

impl ResourcePool {
    pub fn take_texture(
        &mut self,
        desc: &ImageDesc,
    ) -> Option<Arc<GpuTexture>> {
        self.textures.get_mut(desc)?.pop()
    }

    pub fn put_texture(&mut self, texture: Arc<GpuTexture>) {
        self.textures.entry(texture.desc()).or_default().push(texture);
    }

    pub fn take_buffer(&mut self, desc: &BufferDesc) -> Option<Arc<GpuBuffer>> {
        self.buffers.get_mut(desc)?.pop()
    }

    pub fn put_buffer(&mut self, buffer: Arc<GpuBuffer>) {
        self.buffers.entry(buffer.desc()).or_default().push(buffer);
    }

    pub fn len(&self) -> usize {
        self.textures.values().map(Vec::len).sum::<usize>()
            + self.buffers.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops all idle resources.
    pub fn clear(&mut self) {
        debug!("Clearing resource pool; idle={}", self.len());

        self.textures.clear();
        self.buffers.clear();
    }
}
