//! Pipeline status queries and boundary tracking.

use super::dims::ChunkDims;

/// Where a location currently sits in the chunk pipeline.
///
/// Not stored on the chunk: the manager derives it from cache and queue
/// membership on demand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkStatus {
    /// Never requested, dropped after a failed task, or evicted.
    Unknown,

    /// Queued for, or running in, the load stage.
    Loading,

    /// Storage had nothing; queued for, or running in, the generate stage.
    Generating,

    /// Cached, with a mesh build queued or in progress.
    Meshing,

    /// Cached with no outstanding work.
    Ready,
}

impl ChunkStatus {
    /// Whether the chunk can be read from the cache.
    pub fn is_cached(&self) -> bool {
        matches!(self, ChunkStatus::Meshing | ChunkStatus::Ready)
    }

    /// Whether work for this location is still outstanding.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            ChunkStatus::Loading | ChunkStatus::Generating | ChunkStatus::Meshing
        )
    }
}

/// Flags indicating which chunk boundaries a block touches.
///
/// Used to determine which neighbor chunks need a remesh when a block on
/// the boundary is modified.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BoundaryFlags {
    /// Block is on the -X face (local x == 0).
    pub neg_x: bool,
    /// Block is on the +X face (local x == dims.x - 1).
    pub pos_x: bool,
    pub neg_y: bool,
    pub pos_y: bool,
    pub neg_z: bool,
    pub pos_z: bool,
}

impl BoundaryFlags {
    /// Boundary flags for a local coordinate inside a chunk of `dims`.
    pub fn at(x: u32, y: u32, z: u32, dims: ChunkDims) -> Self {
        Self {
            neg_x: x == 0,
            pos_x: x + 1 == dims.x,
            neg_y: y == 0,
            pos_y: y + 1 == dims.y,
            neg_z: z == 0,
            pos_z: z + 1 == dims.z,
        }
    }

    pub fn any(&self) -> bool {
        self.neg_x || self.pos_x || self.neg_y || self.pos_y || self.neg_z || self.pos_z
    }

    /// Neighbor chunk offsets that share a touched boundary.
    ///
    /// Returns offsets as [dx, dy, dz] for each boundary that is set.
    pub fn affected_neighbors(&self) -> Vec<[i32; 3]> {
        let mut neighbors = Vec::with_capacity(6);
        if self.neg_x { neighbors.push([-1, 0, 0]); }
        if self.pos_x { neighbors.push([1, 0, 0]); }
        if self.neg_y { neighbors.push([0, -1, 0]); }
        if self.pos_y { neighbors.push([0, 1, 0]); }
        if self.neg_z { neighbors.push([0, 0, -1]); }
        if self.pos_z { neighbors.push([0, 0, 1]); }
        neighbors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_queries() {
        assert!(ChunkStatus::Ready.is_cached());
        assert!(ChunkStatus::Meshing.is_cached());
        assert!(!ChunkStatus::Generating.is_cached());

        assert!(ChunkStatus::Loading.is_pending());
        assert!(!ChunkStatus::Ready.is_pending());
        assert!(!ChunkStatus::Unknown.is_pending());
    }

    #[test]
    fn interior_block_touches_nothing() {
        let flags = BoundaryFlags::at(1, 1, 1, ChunkDims::new(4, 4, 4));
        assert!(!flags.any());
        assert!(flags.affected_neighbors().is_empty());
    }

    #[test]
    fn corner_block_touches_three() {
        let flags = BoundaryFlags::at(0, 3, 0, ChunkDims::new(4, 4, 4));

        let neighbors = flags.affected_neighbors();
        assert_eq!(neighbors.len(), 3);
        assert!(neighbors.contains(&[-1, 0, 0]));
        assert!(neighbors.contains(&[0, 1, 0]));
        assert!(neighbors.contains(&[0, 0, -1]));
    }

    #[test]
    fn unit_axis_touches_both_sides() {
        let flags = BoundaryFlags::at(0, 0, 0, ChunkDims::new(1, 2, 2));
        assert!(flags.neg_x && flags.pos_x);
        assert!(!flags.pos_y);
    }
}
