use glam::{UVec2, Vec4};

use crate::Tex;

/// In-memory texture for tests.
#[derive(Clone, Debug)]
pub struct TestTex {
    size: UVec2,
    texels: Vec<Vec4>,
}

impl TestTex {
    pub fn from_fn(size: UVec2, mut f: impl FnMut(UVec2) -> Vec4) -> Self {
        let mut texels = Vec::with_capacity((size.x * size.y) as usize);

        for y in 0..size.y {
            for x in 0..size.x {
                texels.push(f(UVec2::new(x, y)));
            }
        }

        Self { size, texels }
    }

    pub fn filled(size: UVec2, value: Vec4) -> Self {
        Self::from_fn(size, |_| value)
    }
}

impl Tex for TestTex {
    fn size(&self) -> UVec2 {
        self.size
    }

    fn read(&self, pos: UVec2) -> Vec4 {
        self.texels[(pos.y * self.size.x + pos.x) as usize]
    }
}
