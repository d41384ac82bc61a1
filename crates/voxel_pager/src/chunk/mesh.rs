//! Render and collision payloads attached to a chunk by the mesh stage.

use std::fmt;
use std::sync::Arc;

use super::dims::ChunkDims;
use super::face::{DefaultFaceVisibility, FaceVisibility};

/// Render geometry for a single chunk.
///
/// Produced by a [`ChunkMeshGenerator`](crate::ChunkMeshGenerator); the core
/// never inspects the contents beyond size accounting.
#[derive(Clone, Debug, Default)]
pub struct ChunkMesh {
    /// Vertex positions (flattened xyz triplets).
    pub positions: Vec<f32>,
    /// Vertex normals (flattened xyz triplets).
    pub normals: Vec<f32>,
    /// UV coordinates (flattened uv pairs).
    pub uvs: Vec<f32>,
    /// Triangle indices.
    pub indices: Vec<u32>,
    /// Version of the block data this mesh was built from. Set by the
    /// chunk manager when the mesh is applied; generators may leave it at 0.
    pub data_version: u64,
}

impl ChunkMesh {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Approximate memory usage in bytes.
    pub fn memory_bytes(&self) -> usize {
        (self.positions.len() + self.normals.len() + self.uvs.len()) * 4 + self.indices.len() * 4
    }
}

/// Triangle soup for physics.
#[derive(Clone, Debug, Default)]
pub struct CollisionMesh {
    pub vertices: Vec<[f32; 3]>,
    pub indices: Vec<[u32; 3]>,
}

impl CollisionMesh {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn memory_bytes(&self) -> usize {
        self.vertices.len() * 12 + self.indices.len() * 12
    }
}

/// Read-only inputs handed to every mesh build.
#[derive(Clone)]
pub struct MeshContext {
    pub dims: ChunkDims,
    /// World units per block edge.
    pub block_scale: f32,
    pub visibility: Arc<dyn FaceVisibility>,
}

impl MeshContext {
    pub fn new(dims: ChunkDims, block_scale: f32) -> Self {
        Self {
            dims,
            block_scale,
            visibility: Arc::new(DefaultFaceVisibility::new()),
        }
    }

    pub fn with_visibility(mut self, visibility: Arc<dyn FaceVisibility>) -> Self {
        self.visibility = visibility;
        self
    }
}

impl fmt::Debug for MeshContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeshContext")
            .field("dims", &self.dims)
            .field("block_scale", &self.block_scale)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_mesh() {
        let mesh = ChunkMesh::empty();
        assert!(mesh.is_empty());
        assert_eq!(mesh.vertex_count(), 0);
        assert_eq!(mesh.memory_bytes(), 0);
    }

    #[test]
    fn counts() {
        let mesh = ChunkMesh {
            positions: vec![0.0; 12],
            normals: vec![0.0; 12],
            uvs: vec![0.0; 8],
            indices: vec![0, 1, 2, 0, 2, 3],
            ..Default::default()
        };
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.memory_bytes(), (12 + 12 + 8 + 6) * 4);
    }
}
