//! Cell coordinate shared by the chunk grid and the page grid.

use std::fmt;

use glam::{IVec3, Vec3};

use super::dims::ChunkDims;

/// Integer cell coordinate in an unbounded 3D grid.
///
/// Identifies a chunk in chunk-space, and (after scaling by the page size)
/// a page in a [`Pager`](crate::Pager). Coordinates can be negative.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Location {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Location {
    /// Origin cell at (0, 0, 0).
    pub const ZERO: Location = Location { x: 0, y: 0, z: 0 };

    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Get the 6 face-adjacent neighbors.
    ///
    /// Returns neighbors in order: +X, -X, +Y, -Y, +Z, -Z
    pub fn neighbors(&self) -> [Location; 6] {
        [
            self.offset(1, 0, 0),
            self.offset(-1, 0, 0),
            self.offset(0, 1, 0),
            self.offset(0, -1, 0),
            self.offset(0, 0, 1),
            self.offset(0, 0, -1),
        ]
    }

    pub const fn offset(&self, dx: i32, dy: i32, dz: i32) -> Self {
        Self { x: self.x + dx, y: self.y + dy, z: self.z + dz }
    }

    /// Cell containing a world position, for cells of `cell_size` world units.
    ///
    /// # Example
    /// ```
    /// use glam::Vec3;
    /// use voxel_pager::Location;
    ///
    /// let size = Vec3::splat(16.0);
    /// assert_eq!(Location::from_world(Vec3::new(15.9, 0.0, 16.0), size), Location::new(0, 0, 1));
    /// assert_eq!(Location::from_world(Vec3::new(-0.1, 0.0, 0.0), size), Location::new(-1, 0, 0));
    /// ```
    pub fn from_world(world_pos: Vec3, cell_size: Vec3) -> Self {
        let cell = (world_pos / cell_size).floor();
        Self::new(cell.x as i32, cell.y as i32, cell.z as i32)
    }

    /// Chunk containing a world block coordinate.
    ///
    /// Uses Euclidean division for correct negative coordinate handling.
    pub fn from_block(block: IVec3, dims: ChunkDims) -> Self {
        let d = dims.as_ivec3();
        Self::new(
            block.x.div_euclid(d.x),
            block.y.div_euclid(d.y),
            block.z.div_euclid(d.z),
        )
    }

    /// Local coordinate of a world block coordinate within its chunk.
    pub fn block_to_local(block: IVec3, dims: ChunkDims) -> [u32; 3] {
        let d = dims.as_ivec3();
        [
            block.x.rem_euclid(d.x) as u32,
            block.y.rem_euclid(d.y) as u32,
            block.z.rem_euclid(d.z) as u32,
        ]
    }

    /// World block coordinate of this chunk's minimum corner.
    pub fn origin_block(&self, dims: ChunkDims) -> IVec3 {
        IVec3::from(*self) * dims.as_ivec3()
    }

    /// World-space center of this cell.
    pub fn center_world(&self, cell_size: Vec3) -> Vec3 {
        (Vec3::new(self.x as f32, self.y as f32, self.z as f32) + Vec3::splat(0.5)) * cell_size
    }

    /// Squared distance between two cells, in cells.
    pub fn distance_squared(&self, other: Location) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        let dz = (self.z - other.z) as i64;
        dx * dx + dy * dy + dz * dz
    }
}

impl From<IVec3> for Location {
    fn from(v: IVec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl From<Location> for IVec3 {
    fn from(loc: Location) -> Self {
        IVec3::new(loc.x, loc.y, loc.z)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}
