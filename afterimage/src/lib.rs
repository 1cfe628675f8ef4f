//! Frame graph and temporal denoising of screen-space effects.
//!
//! Effects (anti-aliasing, ambient occlusion, indirect lighting) are recorded
//! as passes of a [`FrameGraph`], which orders them, culls what's not needed
//! and shares memory between short-lived images; their histories live in a
//! [`HistoryCache`] owned by [`ScreenEffects`].

mod backend;
pub mod backends;
mod config;
pub mod effects;
mod error;
pub mod graph;
mod history;
mod renderer;
pub mod utils;

pub use afterimage_gpu as gpu;

pub use self::backend::*;
pub use self::config::*;
pub use self::error::*;
pub use self::graph::{
    Access, Buffer, BufferDesc, CompiledGraph, ExecutionReport, FrameGraph,
    Handle, Image, ImageDesc, Lifetime, PassBuilder, PassContext, ResourceDesc,
    ResourceId,
};
pub use self::history::*;
pub use self::renderer::*;
