//! Chunk pipeline for streamed voxel worlds.
//!
//! This module provides:
//! - [`Location`]: Cell coordinates with neighbor calculation
//! - [`Chunk`]: Block storage with derived `empty`/`full` flags
//! - [`ChunkCache`]: Bounded LRU store that owns chunk lifetime
//! - [`ChunkManager`]: Load → generate → mesh orchestration
//! - [`FaceVisibility`]: Pluggable face-culling policy
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        ChunkManager                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  Stage<Option<Chunk>>  load      - repository, or inline miss   │
//! │  Stage<Chunk>          generate  - generator, or inline empty   │
//! │  Stage<MeshOutput>     mesh      - mesh generator on snapshots  │
//! │  Arc<ChunkCache>                 - LRU, clears on eviction      │
//! └─────────────────────────────────────────────────────────────────┘
//!                           │
//!              ┌────────────┼────────────┐
//!              ▼            ▼            ▼
//!        ┌──────────┐ ┌──────────┐ ┌──────────┐
//!        │  Stage   │ │  Stage   │ │  Stage   │
//!        ├──────────┤ ├──────────┤ ├──────────┤
//!        │queue     │ │queue     │ │queue     │
//!        │in_flight │ │in_flight │ │in_flight │
//!        │pool      │ │pool      │ │pool      │
//!        │channel   │ │channel   │ │channel   │
//!        └──────────┘ └──────────┘ └──────────┘
//! ```
//!
//! Each [`ChunkManager::update`] harvests and submits at most one task per
//! stage, so the driver thread never does more than a fixed amount of work.

pub mod dims;
pub mod location;
pub mod face;
pub mod state;
pub mod mesh;
pub mod chunk;
pub mod resolver;
pub mod lru;
pub mod cache;
pub mod queue;
pub mod stage;
pub mod provider;
pub mod stats;
pub mod manager;

// Re-export primary types
pub use dims::ChunkDims;
pub use location::Location;
pub use face::{DefaultFaceVisibility, Face, FaceVisibility};
pub use state::{BoundaryFlags, ChunkStatus};
pub use mesh::{ChunkMesh, CollisionMesh, MeshContext};
pub use chunk::{Chunk, ChunkHandle};
pub use resolver::ChunkResolver;
pub use lru::LruTracker;
pub use cache::ChunkCache;
pub use queue::UniqueQueue;
pub use stage::StageKind;
pub use provider::{
    ChunkGenerator, ChunkManagerListener, ChunkMeshGenerator, ChunkRepository, EmptyGenerator,
    LayerGenerator,
};
pub use stats::{ChunkDebugInfo, PagerStats, PipelineStats};
pub use manager::{ChunkManager, ChunkManagerBuilder};
