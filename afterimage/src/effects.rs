//! Screen-space effects, recorded as passes of a [`crate::FrameGraph`].

mod estimate;
mod ssao;
mod ssgi;
mod taa;
mod temporal;

pub use self::estimate::*;
pub use self::ssao::*;
pub use self::ssgi::*;
pub use self::taa::*;
pub use self::temporal::*;
