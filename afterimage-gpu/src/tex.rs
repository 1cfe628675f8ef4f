use glam::{IVec2, UVec2, Vec4};

/// Read-only two-dimensional texture.
///
/// Texels are always read as `Vec4`, regardless of the underlying format;
/// channels not present in the format read as zero.
pub trait Tex {
    fn size(&self) -> UVec2;

    fn read(&self, pos: UVec2) -> Vec4;

    fn contains(&self, pos: IVec2) -> bool {
        let size = self.size().as_ivec2();

        pos.x >= 0 && pos.y >= 0 && pos.x < size.x && pos.y < size.y
    }

    /// Reads texel at given position, clamping the position to the edges of
    /// this texture.
    fn read_clamped(&self, pos: IVec2) -> Vec4 {
        let max = self.size().as_ivec2() - IVec2::ONE;

        self.read(pos.max(IVec2::ZERO).min(max).as_uvec2())
    }
}

impl<T> Tex for &T
where
    T: Tex + ?Sized,
{
    fn size(&self) -> UVec2 {
        T::size(self)
    }

    fn read(&self, pos: UVec2) -> Vec4 {
        T::read(self, pos)
    }
}
