//! Collaborator contracts consumed by the pipeline, plus simple generators.

use crate::block::Block;
use crate::error::BoxError;
use super::chunk::{Chunk, ChunkHandle};
use super::dims::ChunkDims;
use super::location::Location;
use super::mesh::MeshContext;

/// Persistent chunk storage.
pub trait ChunkRepository: Send + Sync {
    /// Load a stored chunk. `Ok(None)` means nothing is stored there and the
    /// location falls through to generation.
    fn load(&self, location: Location, dims: ChunkDims) -> Result<Option<Chunk>, BoxError>;

    /// Persist a chunk. Returns false if it was not written.
    fn save(&self, chunk: &Chunk) -> bool;
}

/// Procedural chunk source. Must always produce a chunk.
pub trait ChunkGenerator: Send + Sync {
    fn generate(&self, location: Location, dims: ChunkDims) -> Chunk;
}

/// Builds render and collision representations in place.
///
/// Receives a snapshot of the chunk; blocks outside it are reachable through
/// [`Chunk::block_at_relative`].
pub trait ChunkMeshGenerator: Send + Sync {
    fn build(&self, chunk: &mut Chunk, context: &MeshContext) -> Result<(), BoxError>;
}

/// Observer of pipeline completions. Called on the driver thread.
pub trait ChunkManagerListener: Send + Sync {
    /// A mesh build finished and was applied.
    fn on_chunk_updated(&self, chunk: &ChunkHandle);

    /// A chunk was loaded or generated and entered the cache.
    fn on_chunk_available(&self, chunk: &ChunkHandle);

    /// A task for this location failed and the request was dropped.
    fn on_chunk_dropped(&self, _location: Location) {}
}

/// Generator producing chunks with every slot unset.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyGenerator;

impl ChunkGenerator for EmptyGenerator {
    fn generate(&self, location: Location, dims: ChunkDims) -> Chunk {
        Chunk::new(location, dims)
    }
}

/// Generator filling chosen world-space block layers with one block.
///
/// Layers are world block y coordinates, so a layer lands only in the
/// chunks whose vertical extent contains it.
#[derive(Clone, Debug)]
pub struct LayerGenerator {
    block: Block,
    layers: Vec<i32>,
}

impl LayerGenerator {
    pub fn new(block: Block, layers: impl IntoIterator<Item = i32>) -> Self {
        Self {
            block,
            layers: layers.into_iter().collect(),
        }
    }

    /// Fill every layer below `height` (exclusive) down to `floor`.
    pub fn ground(block: Block, floor: i32, height: i32) -> Self {
        Self::new(block, floor..height)
    }
}

impl ChunkGenerator for LayerGenerator {
    fn generate(&self, location: Location, dims: ChunkDims) -> Chunk {
        let mut chunk = Chunk::new(location, dims);
        let base_y = location.y * dims.y as i32;
        for &layer in &self.layers {
            let local_y = layer - base_y;
            if local_y < 0 || local_y >= dims.y as i32 {
                continue;
            }
            for z in 0..dims.z {
                for x in 0..dims.x {
                    chunk.set_block_raw(x, local_y as u32, z, Some(self.block.clone()));
                }
            }
        }
        chunk.update_flags();
        chunk
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockDef;

    #[test]
    fn empty_generator() {
        let chunk = EmptyGenerator.generate(Location::new(3, -1, 2), ChunkDims::new(4, 4, 4));
        assert_eq!(chunk.location(), Location::new(3, -1, 2));
        assert!(chunk.is_empty());
    }

    #[test]
    fn layer_generator_fills_only_its_layer() {
        let stone = Block::new(BlockDef::solid("stone"));
        let generator = LayerGenerator::new(stone.clone(), [0]);
        let dims = ChunkDims::new(2, 2, 2);

        let chunk = generator.generate(Location::ZERO, dims);
        assert!(!chunk.is_empty());
        assert!(!chunk.is_full());
        assert_eq!(chunk.filled_count(), 4);
        assert_eq!(chunk.block_at(1, 0, 1), Some(&stone));
        assert!(chunk.block_at(1, 1, 1).is_none());

        let above = generator.generate(Location::new(0, 1, 0), dims);
        assert!(above.is_empty());
    }

    #[test]
    fn ground_spans_chunks() {
        let stone = Block::new(BlockDef::solid("stone"));
        let generator = LayerGenerator::ground(stone, -4, 0);
        let dims = ChunkDims::new(2, 2, 2);

        assert!(generator.generate(Location::new(0, -1, 0), dims).is_full());
        assert!(generator.generate(Location::new(5, -2, 0), dims).is_full());
        assert!(generator.generate(Location::new(0, 0, 0), dims).is_empty());
    }
}
