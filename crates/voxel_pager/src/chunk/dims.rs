//! Fixed chunk extents and flat slot indexing.

use glam::{IVec3, Vec3};

/// Extent of a chunk in blocks along each axis.
///
/// Constant for the lifetime of a [`ChunkManager`](crate::ChunkManager);
/// validated as positive by [`WorldConfig`](crate::WorldConfig).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkDims {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl ChunkDims {
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Number of block slots in one chunk.
    pub fn volume(&self) -> usize {
        self.x as usize * self.y as usize * self.z as usize
    }

    /// Whether a local coordinate lies inside the chunk.
    pub fn contains(&self, x: i32, y: i32, z: i32) -> bool {
        x >= 0 && y >= 0 && z >= 0 && (x as u32) < self.x && (y as u32) < self.y && (z as u32) < self.z
    }

    /// Flat slot index for a local coordinate, or `None` if out of bounds.
    ///
    /// Layout is x-fastest, then z, then y, so a horizontal layer is contiguous.
    pub fn index(&self, x: u32, y: u32, z: u32) -> Option<usize> {
        if x >= self.x || y >= self.y || z >= self.z {
            return None;
        }
        Some((y as usize * self.z as usize + z as usize) * self.x as usize + x as usize)
    }

    /// Inverse of [`index`](Self::index).
    pub fn coords(&self, index: usize) -> [u32; 3] {
        let x = index % self.x as usize;
        let rest = index / self.x as usize;
        let z = rest % self.z as usize;
        let y = rest / self.z as usize;
        [x as u32, y as u32, z as u32]
    }

    pub fn as_ivec3(&self) -> IVec3 {
        IVec3::new(self.x as i32, self.y as i32, self.z as i32)
    }

    pub fn as_vec3(&self) -> Vec3 {
        Vec3::new(self.x as f32, self.y as f32, self.z as f32)
    }
}

impl From<[u32; 3]> for ChunkDims {
    fn from(dims: [u32; 3]) -> Self {
        Self::new(dims[0], dims[1], dims[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume() {
        assert_eq!(ChunkDims::new(2, 3, 4).volume(), 24);
    }

    #[test]
    fn index_is_dense_and_invertible() {
        let dims = ChunkDims::new(3, 2, 4);
        let mut seen = vec![false; dims.volume()];
        for y in 0..dims.y {
            for z in 0..dims.z {
                for x in 0..dims.x {
                    let i = dims.index(x, y, z).unwrap();
                    assert!(!seen[i]);
                    seen[i] = true;
                    assert_eq!(dims.coords(i), [x, y, z]);
                }
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn out_of_bounds() {
        let dims = ChunkDims::new(2, 2, 2);
        assert!(dims.index(2, 0, 0).is_none());
        assert!(!dims.contains(-1, 0, 0));
        assert!(!dims.contains(0, 2, 0));
        assert!(dims.contains(1, 1, 1));
    }

    #[test]
    fn layer_is_contiguous() {
        let dims = ChunkDims::new(4, 4, 4);
        let first = dims.index(0, 1, 0).unwrap();
        let last = dims.index(3, 1, 3).unwrap();
        assert_eq!(last - first + 1, 16);
    }
}
