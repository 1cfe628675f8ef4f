//! Frame graph: passes recorded in submission order, together with the
//! resources they read and write, compiled into an execution order.
//!
//! Recording a frame looks like this:
//!
//! ```ignore
//! let mut graph = FrameGraph::new();
//! let depth = graph.import_image("depth", depth, depth_desc);
//!
//! let mut pass = graph.add_pass("ssao_estimate");
//! let depth = pass.read(depth);
//! let ao = pass.create_image("ssao_estimate", desc);
//!
//! pass.execute(move |ctx| {
//!     let depth = ctx.read(depth)?;
//!     let ao = ctx.write(ao)?;
//!
//!     ctx.backend().ssao(&depth, &normal, &ao, params)
//! });
//!
//! let report = graph.compile()?.execute(&mut backend)?;
//! ```

mod compile;
mod execute;
mod pass;
mod resource;

use derivative::Derivative;

pub use self::compile::*;
pub use self::execute::*;
pub use self::pass::*;
pub use self::resource::*;
use crate::{Backend, Error, HistorySlot, Result};

#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct FrameGraph<B>
where
    B: Backend,
{
    pub(crate) id: GraphId,
    pub(crate) resources: Vec<ResourceEntry<B::Resource>>,
    pub(crate) passes: Vec<PassNode<B>>,

    /// Errors spotted while recording; reported by `compile()`, so that
    /// recording itself stays infallible
    pub(crate) errors: Vec<Error>,
}

impl<B> FrameGraph<B>
where
    B: Backend,
{
    pub fn new() -> Self {
        Self {
            id: GraphId::next(),
            resources: Default::default(),
            passes: Default::default(),
            errors: Default::default(),
        }
    }

    /// Starts recording a pass; the pass gets registered once
    /// [`PassBuilder::execute()`] is called.
    pub fn add_pass(&mut self, name: impl ToString) -> PassBuilder<'_, B> {
        PassBuilder {
            node: PassNode::new(name.to_string()),
            graph: self,
        }
    }

    /// Creates a transient image, to be written by one of the later passes.
    pub fn create_image(
        &mut self,
        name: impl ToString,
        desc: ImageDesc,
    ) -> Handle<Image> {
        self.push(name, desc.into(), Lifetime::Transient, None)
    }

    /// Creates a transient buffer, to be written by one of the later passes.
    pub fn create_buffer(
        &mut self,
        name: impl ToString,
        desc: BufferDesc,
    ) -> Handle<Buffer> {
        self.push(name, desc.into(), Lifetime::Transient, None)
    }

    pub fn import_image(
        &mut self,
        name: impl ToString,
        resource: B::Resource,
        desc: ImageDesc,
    ) -> Handle<Image> {
        self.push(name, desc.into(), Lifetime::Imported, Some(resource))
    }

    pub fn import_buffer(
        &mut self,
        name: impl ToString,
        resource: B::Resource,
        desc: BufferDesc,
    ) -> Handle<Buffer> {
        self.push(name, desc.into(), Lifetime::Imported, Some(resource))
    }

    /// Imports a history slot; passes writing it are never culled.
    pub fn import_history(
        &mut self,
        name: impl ToString,
        slot: &HistorySlot<B::Resource>,
    ) -> Handle<Image> {
        self.push(
            name,
            slot.desc.into(),
            Lifetime::Persistent,
            Some(slot.resource.clone()),
        )
    }

    pub fn image_desc(&self, handle: Handle<Image>) -> Result<ImageDesc> {
        self.entry(handle)?
            .desc
            .as_image()
            .copied()
            .ok_or_else(|| Error::WrongResourceKind {
                resource: self.resources[handle.id.0].name.clone(),
            })
    }

    pub fn buffer_desc(&self, handle: Handle<Buffer>) -> Result<BufferDesc> {
        self.entry(handle)?
            .desc
            .as_buffer()
            .copied()
            .ok_or_else(|| Error::WrongResourceKind {
                resource: self.resources[handle.id.0].name.clone(),
            })
    }

    pub fn lifetime<T>(&self, handle: Handle<T>) -> Result<Lifetime> {
        Ok(self.entry(handle)?.lifetime)
    }

    pub fn resource_name<T>(&self, handle: Handle<T>) -> Result<&str> {
        Ok(&self.entry(handle)?.name)
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    fn entry<T>(
        &self,
        handle: Handle<T>,
    ) -> Result<&ResourceEntry<B::Resource>> {
        if handle.graph != self.id {
            return Err(Error::ForeignHandle {
                pass: "<recording>".into(),
                resource: format!("#{}", handle.id.0),
            });
        }

        Ok(&self.resources[handle.id.0])
    }

    fn push<T>(
        &mut self,
        name: impl ToString,
        desc: ResourceDesc,
        lifetime: Lifetime,
        external: Option<B::Resource>,
    ) -> Handle<T> {
        let id = ResourceId(self.resources.len());

        self.resources.push(ResourceEntry {
            name: name.to_string(),
            desc,
            lifetime,
            external,
        });

        Handle::new(self.id, id)
    }
}

impl<B> Default for FrameGraph<B>
where
    B: Backend,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Records accesses of a single pass.
///
/// A builder dropped without calling [`Self::execute()`] doesn't register
/// anything, though resources it created stay in the graph (and get culled,
/// unless someone else writes them).
pub struct PassBuilder<'g, B>
where
    B: Backend,
{
    graph: &'g mut FrameGraph<B>,
    node: PassNode<B>,
}

impl<'g, B> PassBuilder<'g, B>
where
    B: Backend,
{
    pub fn read<T>(&mut self, handle: Handle<T>) -> Handle<T> {
        self.access(handle, Access::Read)
    }

    pub fn write<T>(&mut self, handle: Handle<T>) -> Handle<T> {
        self.access(handle, Access::Write)
    }

    pub fn read_write<T>(&mut self, handle: Handle<T>) -> Handle<T> {
        self.access(handle, Access::ReadWrite)
    }

    /// Creates a transient image written by this pass.
    pub fn create_image(
        &mut self,
        name: impl ToString,
        desc: ImageDesc,
    ) -> Handle<Image> {
        let handle = self.graph.create_image(name, desc);

        self.write(handle)
    }

    /// Creates a transient buffer written by this pass.
    pub fn create_buffer(
        &mut self,
        name: impl ToString,
        desc: BufferDesc,
    ) -> Handle<Buffer> {
        let handle = self.graph.create_buffer(name, desc);

        self.write(handle)
    }

    /// Makes this pass survive culling even if nothing reads its outputs.
    pub fn pin(&mut self) -> &mut Self {
        self.node.pinned = true;
        self
    }

    pub fn image_desc(&self, handle: Handle<Image>) -> Result<ImageDesc> {
        self.graph.image_desc(handle)
    }

    pub fn execute<F>(mut self, f: F)
    where
        F: FnOnce(&mut PassContext<'_, B>) -> Result<()> + 'static,
    {
        self.node.run = Some(Box::new(f));
        self.graph.passes.push(self.node);
    }

    fn access<T>(&mut self, handle: Handle<T>, access: Access) -> Handle<T> {
        if handle.graph != self.graph.id {
            self.graph.errors.push(Error::ForeignHandle {
                pass: self.node.name.clone(),
                resource: format!("#{}", handle.id.0),
            });
        } else {
            self.node.declare(handle.id, access);
        }

        handle
    }
}

#[cfg(test)]
mod tests;
