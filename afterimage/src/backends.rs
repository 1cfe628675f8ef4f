//! Implementations of [`crate::Backend`] and [`crate::Kernels`].

pub mod cpu;
pub mod wgpu;
