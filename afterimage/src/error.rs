use glam::UVec2;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("pass `{pass}` reads `{resource}`, but no pass writes it")]
    MissingWriter { pass: String, resource: String },

    #[error(
        "passes `{first}` and `{second}` depend on each other (through \
         `{resource}`)"
    )]
    Cycle {
        first: String,
        second: String,
        resource: String,
    },

    #[error("pass `{pass}` refers to resource `{resource}` of another graph")]
    ForeignHandle { pass: String, resource: String },

    #[error("pass `{pass}` accesses `{resource}` without declaring it")]
    UndeclaredAccess { pass: String, resource: String },

    #[error("resource `{resource}` is of a different kind than expected")]
    WrongResourceKind { resource: String },

    #[error("kernels can't write images of format {0:?}")]
    UnsupportedFormat(wgpu::TextureFormat),

    #[error("size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: UVec2, actual: UVec2 },

    #[error("pass `{pass}` failed")]
    PassFailed {
        pass: String,

        #[source]
        source: Box<Error>,
    },

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl Error {
    /// Returns the innermost error, looking through [`Error::PassFailed`].
    pub fn root(&self) -> &Self {
        match self {
            Error::PassFailed { source, .. } => source.root(),
            err => err,
        }
    }
}
