use afterimage_gpu::{
    Accumulation, Axis, BilateralParams, SsaoParams, UpsampleParams,
};

use crate::{ResourceDesc, Result};

/// Something that can provide physical resources to a frame graph.
pub trait Backend {
    type Resource: Clone + std::fmt::Debug;

    fn allocate(
        &mut self,
        label: &str,
        desc: &ResourceDesc,
    ) -> Result<Self::Resource>;

    fn release(&mut self, resource: Self::Resource);
}

/// Image kernels used by the screen-space effects.
///
/// Every kernel writes the whole `output` image, processing one pixel at a
/// time; see `afterimage_gpu` for the per-pixel algorithms.
pub trait Kernels: Backend {
    /// Copies `input` into `output`, converting the format if needed.
    fn copy(
        &mut self,
        input: &Self::Resource,
        output: &Self::Resource,
    ) -> Result<()>;

    /// Starts a new history out of the current estimate: `xyz` comes from
    /// `estimate` and `w` (accumulated frame count) is set to one.
    fn seed_history(
        &mut self,
        estimate: &Self::Resource,
        history: &Self::Resource,
    ) -> Result<()>;

    /// Box-filters `input` into the (smaller) `output`.
    fn downsample_average(
        &mut self,
        input: &Self::Resource,
        output: &Self::Resource,
    ) -> Result<()>;

    /// Downsamples `input` by picking, for each output texel, the input texel
    /// closest to the camera according to `depth`.
    fn downsample_closest(
        &mut self,
        depth: &Self::Resource,
        input: &Self::Resource,
        output: &Self::Resource,
    ) -> Result<()>;

    /// Warps `history` into the current frame; `output` has the size of
    /// `motion`, which can be smaller than `history`.
    fn reproject(
        &mut self,
        history: &Self::Resource,
        motion: &Self::Resource,
        output: &Self::Resource,
    ) -> Result<()>;

    fn accumulate(
        &mut self,
        estimate: &Self::Resource,
        warped: &Self::Resource,
        output: &Self::Resource,
        policy: Accumulation,
    ) -> Result<()>;

    #[allow(clippy::too_many_arguments)]
    fn bilateral(
        &mut self,
        input: &Self::Resource,
        depth: &Self::Resource,
        normal: &Self::Resource,
        output: &Self::Resource,
        params: BilateralParams,
        axis: Axis,
    ) -> Result<()>;

    #[allow(clippy::too_many_arguments)]
    fn upsample(
        &mut self,
        input: &Self::Resource,
        low_depth: &Self::Resource,
        low_normal: &Self::Resource,
        high_depth: &Self::Resource,
        high_normal: &Self::Resource,
        output: &Self::Resource,
        params: UpsampleParams,
    ) -> Result<()>;

    fn ssao(
        &mut self,
        depth: &Self::Resource,
        normal: &Self::Resource,
        output: &Self::Resource,
        params: SsaoParams,
    ) -> Result<()>;
}
