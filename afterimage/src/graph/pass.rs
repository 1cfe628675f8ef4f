use derivative::Derivative;

use super::{
    Buffer, BufferDesc, GraphId, Handle, Image, ImageDesc, ResourceEntry,
    ResourceId,
};
use crate::{Backend, Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Access {
    Read,
    Write,

    /// Read followed by a write, both by the same pass
    ReadWrite,
}

impl Access {
    pub fn is_read(self) -> bool {
        matches!(self, Access::Read | Access::ReadWrite)
    }

    pub fn is_write(self) -> bool {
        matches!(self, Access::Write | Access::ReadWrite)
    }

    fn merge(self, other: Self) -> Self {
        if self == other {
            self
        } else {
            Access::ReadWrite
        }
    }
}

pub(crate) type PassFn<B> =
    Box<dyn FnOnce(&mut PassContext<'_, B>) -> Result<()>>;

#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub(crate) struct PassNode<B>
where
    B: Backend,
{
    pub name: String,
    pub accesses: Vec<(ResourceId, Access)>,
    pub pinned: bool,

    #[derivative(Debug = "ignore")]
    pub run: Option<PassFn<B>>,
}

impl<B> PassNode<B>
where
    B: Backend,
{
    pub fn new(name: String) -> Self {
        Self {
            name,
            accesses: Default::default(),
            pinned: false,
            run: None,
        }
    }

    pub fn declare(&mut self, resource: ResourceId, access: Access) {
        if let Some((_, prev)) =
            self.accesses.iter_mut().find(|(id, _)| *id == resource)
        {
            *prev = prev.merge(access);
        } else {
            self.accesses.push((resource, access));
        }
    }
}

/// What a pass sees while it's being executed.
pub struct PassContext<'a, B>
where
    B: Backend,
{
    pub(crate) pass: &'a str,
    pub(crate) graph: GraphId,
    pub(crate) accesses: &'a [(ResourceId, Access)],
    pub(crate) resources: &'a [ResourceEntry<B::Resource>],
    pub(crate) bindings: &'a [Option<B::Resource>],
    pub(crate) backend: &'a mut B,
}

impl<'a, B> PassContext<'a, B>
where
    B: Backend,
{
    pub fn name(&self) -> &str {
        self.pass
    }

    pub fn backend(&mut self) -> &mut B {
        self.backend
    }

    /// Returns the physical resource behind a handle this pass declared as
    /// read.
    pub fn read<T>(&self, handle: Handle<T>) -> Result<B::Resource> {
        self.resolve(handle, Access::Read)
    }

    /// Returns the physical resource behind a handle this pass declared as
    /// written.
    pub fn write<T>(&self, handle: Handle<T>) -> Result<B::Resource> {
        self.resolve(handle, Access::Write)
    }

    pub fn image_desc(&self, handle: Handle<Image>) -> Result<ImageDesc> {
        self.check_graph(handle)?;

        let entry = &self.resources[handle.id.0];

        entry.desc.as_image().copied().ok_or_else(|| {
            Error::WrongResourceKind {
                resource: entry.name.clone(),
            }
        })
    }

    pub fn buffer_desc(&self, handle: Handle<Buffer>) -> Result<BufferDesc> {
        self.check_graph(handle)?;

        let entry = &self.resources[handle.id.0];

        entry.desc.as_buffer().copied().ok_or_else(|| {
            Error::WrongResourceKind {
                resource: entry.name.clone(),
            }
        })
    }

    fn resolve<T>(
        &self,
        handle: Handle<T>,
        access: Access,
    ) -> Result<B::Resource> {
        self.check_graph(handle)?;

        let declared = self
            .accesses
            .iter()
            .find(|(id, _)| *id == handle.id)
            .map(|(_, access)| *access);

        let allowed = match declared {
            Some(declared) => {
                (access.is_read() && declared.is_read())
                    || (access.is_write() && declared.is_write())
            }
            None => false,
        };

        let binding = self.bindings[handle.id.0].as_ref();

        match binding {
            Some(resource) if allowed => Ok(resource.clone()),

            _ => Err(Error::UndeclaredAccess {
                pass: self.pass.to_owned(),
                resource: self.resources[handle.id.0].name.clone(),
            }),
        }
    }

    fn check_graph<T>(&self, handle: Handle<T>) -> Result<()> {
        if handle.graph == self.graph {
            Ok(())
        } else {
            Err(Error::ForeignHandle {
                pass: self.pass.to_owned(),
                resource: format!("#{}", handle.id.0),
            })
        }
    }
}
