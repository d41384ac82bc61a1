//! Chunk data structure: block slots, derived flags, and attached payloads.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::block::Block;
use super::dims::ChunkDims;
use super::face::{Face, FaceVisibility};
use super::location::Location;
use super::mesh::{ChunkMesh, CollisionMesh};
use super::resolver::ChunkResolver;
use super::state::BoundaryFlags;

/// Shared reference to a cached chunk.
///
/// The cache slot is the owner; other holders see a cleared chunk once the
/// slot is evicted.
pub type ChunkHandle = Arc<RwLock<Chunk>>;

/// Fixed-size grid of optional blocks at one [`Location`].
///
/// `empty` and `full` are derived from the slots and kept current by
/// [`set_block`](Chunk::set_block) and [`update_flags`](Chunk::update_flags).
#[derive(Clone)]
pub struct Chunk {
    location: Location,
    dims: ChunkDims,

    /// Block slots in [`ChunkDims::index`] order. `None` once cleared.
    blocks: Option<Vec<Option<Block>>>,

    /// Number of set slots.
    filled: usize,

    /// Monotonically increasing version, incremented on any block edit.
    data_version: u64,

    mesh: Option<ChunkMesh>,
    collision: Option<CollisionMesh>,
    resolver: Option<Weak<dyn ChunkResolver>>,

    /// Number of pagers currently displaying this chunk.
    attach_count: u32,
}

impl Chunk {
    /// Create a chunk with every slot unset.
    pub fn new(location: Location, dims: ChunkDims) -> Self {
        Self {
            location,
            dims,
            blocks: Some(vec![None; dims.volume()]),
            filled: 0,
            data_version: 0,
            mesh: None,
            collision: None,
            resolver: None,
            attach_count: 0,
        }
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn dims(&self) -> ChunkDims {
        self.dims
    }

    pub fn data_version(&self) -> u64 {
        self.data_version
    }

    // ========================================================================
    // Blocks
    // ========================================================================

    /// Block at a local coordinate, or `None` if unset or out of bounds.
    pub fn block_at(&self, x: u32, y: u32, z: u32) -> Option<&Block> {
        let index = self.dims.index(x, y, z)?;
        self.blocks.as_ref()?[index].as_ref()
    }

    /// Set or clear a slot and refresh the derived flags.
    ///
    /// Returns false if the coordinate is out of bounds or the chunk has
    /// been cleared.
    pub fn set_block(&mut self, x: u32, y: u32, z: u32, block: Option<Block>) -> bool {
        let Some(index) = self.dims.index(x, y, z) else {
            return false;
        };
        let Some(blocks) = self.blocks.as_mut() else {
            return false;
        };
        let was_set = blocks[index].is_some();
        let now_set = block.is_some();
        blocks[index] = block;
        match (was_set, now_set) {
            (false, true) => self.filled += 1,
            (true, false) => self.filled -= 1,
            _ => {}
        }
        self.data_version += 1;
        true
    }

    /// Set a slot without refreshing flags or version (for batch operations).
    ///
    /// Call [`update_flags`](Self::update_flags) once the batch is complete.
    pub fn set_block_raw(&mut self, x: u32, y: u32, z: u32, block: Option<Block>) -> bool {
        let Some(index) = self.dims.index(x, y, z) else {
            return false;
        };
        match self.blocks.as_mut() {
            Some(blocks) => {
                blocks[index] = block;
                true
            }
            None => false,
        }
    }

    /// Recompute `empty`/`full` in one pass and bump the version.
    pub fn update_flags(&mut self) {
        self.filled = self
            .blocks
            .as_ref()
            .map_or(0, |blocks| blocks.iter().filter(|slot| slot.is_some()).count());
        self.data_version += 1;
    }

    /// Every slot unset.
    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// Every slot set.
    pub fn is_full(&self) -> bool {
        self.blocks.is_some() && self.filled == self.dims.volume()
    }

    pub fn filled_count(&self) -> usize {
        self.filled
    }

    /// Block at a coordinate relative to this chunk's origin.
    ///
    /// Coordinates outside the chunk are resolved through the neighbor
    /// lookup, if one is set and the neighbor is cached.
    pub fn block_at_relative(&self, x: i32, y: i32, z: i32) -> Option<Block> {
        if self.dims.contains(x, y, z) {
            return self.block_at(x as u32, y as u32, z as u32).cloned();
        }
        let d = self.dims.as_ivec3();
        let neighbor = self.location.offset(
            x.div_euclid(d.x),
            y.div_euclid(d.y),
            z.div_euclid(d.z),
        );
        let handle = self.resolver()?.get(neighbor)?;
        let chunk = handle.read();
        chunk
            .block_at(
                x.rem_euclid(d.x) as u32,
                y.rem_euclid(d.y) as u32,
                z.rem_euclid(d.z) as u32,
            )
            .cloned()
    }

    /// Whether the given face of the block at a local coordinate is drawn.
    ///
    /// Unset slots have no visible faces.
    pub fn is_face_visible(
        &self,
        x: u32,
        y: u32,
        z: u32,
        face: Face,
        visibility: &dyn FaceVisibility,
    ) -> bool {
        let Some(block) = self.block_at(x, y, z) else {
            return false;
        };
        let [dx, dy, dz] = face.offset();
        let neighbor = self.block_at_relative(x as i32 + dx, y as i32 + dy, z as i32 + dz);
        visibility.is_visible(block, neighbor.as_ref())
    }

    /// Which chunk boundaries a local coordinate touches.
    pub fn boundary_flags(&self, x: u32, y: u32, z: u32) -> BoundaryFlags {
        BoundaryFlags::at(x, y, z, self.dims)
    }

    // ========================================================================
    // Representations
    // ========================================================================

    pub fn mesh(&self) -> Option<&ChunkMesh> {
        self.mesh.as_ref()
    }

    pub fn set_mesh(&mut self, mesh: Option<ChunkMesh>) {
        self.mesh = mesh;
    }

    pub fn take_mesh(&mut self) -> Option<ChunkMesh> {
        self.mesh.take()
    }

    pub fn collision(&self) -> Option<&CollisionMesh> {
        self.collision.as_ref()
    }

    pub fn set_collision(&mut self, collision: Option<CollisionMesh>) {
        self.collision = collision;
    }

    pub fn take_collision(&mut self) -> Option<CollisionMesh> {
        self.collision.take()
    }

    // ========================================================================
    // Neighbors and attachment
    // ========================================================================

    /// Live neighbor lookup, if one is set and its owner still exists.
    pub fn resolver(&self) -> Option<Arc<dyn ChunkResolver>> {
        self.resolver.as_ref()?.upgrade()
    }

    pub fn set_resolver(&mut self, resolver: Weak<dyn ChunkResolver>) {
        self.resolver = Some(resolver);
    }

    pub fn attach_count(&self) -> u32 {
        self.attach_count
    }

    pub fn is_attached(&self) -> bool {
        self.attach_count > 0
    }

    pub fn mark_attached(&mut self) {
        self.attach_count += 1;
    }

    pub fn mark_detached(&mut self) {
        self.attach_count = self.attach_count.saturating_sub(1);
    }

    // ========================================================================
    // Lifetime
    // ========================================================================

    /// Whether [`clear`](Self::clear) has released this chunk's storage.
    pub fn is_cleared(&self) -> bool {
        self.blocks.is_none()
    }

    /// Release block storage, representations and the neighbor lookup.
    ///
    /// Called by the cache on eviction. A cleared chunk reads as empty.
    pub fn clear(&mut self) {
        self.blocks = None;
        self.filled = 0;
        self.mesh = None;
        self.collision = None;
        self.resolver = None;
        self.data_version += 1;
    }

    /// Approximate memory usage in bytes.
    pub fn memory_bytes(&self) -> usize {
        let slots = self
            .blocks
            .as_ref()
            .map_or(0, |blocks| blocks.len() * std::mem::size_of::<Option<Block>>());
        slots
            + self.mesh.as_ref().map_or(0, ChunkMesh::memory_bytes)
            + self.collision.as_ref().map_or(0, CollisionMesh::memory_bytes)
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("location", &self.location)
            .field("dims", &self.dims)
            .field("filled", &self.filled)
            .field("cleared", &self.is_cleared())
            .field("data_version", &self.data_version)
            .field("has_mesh", &self.mesh.is_some())
            .field("has_collision", &self.collision.is_some())
            .field("attach_count", &self.attach_count)
            .finish()
    }
}
