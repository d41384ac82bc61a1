//! Chunk streaming for voxel worlds.
//!
//! This crate moves fixed-size chunks through a load → generate → mesh
//! pipeline backed by worker pools, keeps them in a bounded LRU cache, and
//! attaches their representations around a moving focus with a [`Pager`].
//! The driver thread does a fixed amount of work per call.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use voxel_pager::{
//!     Block, BlockDef, Chunk, ChunkManager, LayerGenerator, Location, PageHandler, Pager,
//!     PagerConfig, WorldConfig,
//! };
//!
//! struct Pages;
//!
//! impl PageHandler<usize> for Pages {
//!     fn create_page(&mut self, chunk: &Chunk) -> Option<usize> {
//!         Some(chunk.filled_count())
//!     }
//!     fn attach_page(&mut self, _: Location, _: &usize) {}
//!     fn detach_page(&mut self, _: Location, _: &usize) {}
//! }
//!
//! let config = WorldConfig::single_threaded()
//!     .with_chunk_dims(4, 4, 4).unwrap()
//!     .with_grid_size(3, 1, 3).unwrap();
//! let mut manager = ChunkManager::builder(config.clone())
//!     .generator(LayerGenerator::new(Block::new(BlockDef::solid("stone")), [0]))
//!     .build()
//!     .unwrap();
//! let mut pager = Pager::new(PagerConfig::from_world(&config), Pages, &mut manager);
//!
//! while !pager.is_converged() {
//!     manager.update(Duration::from_millis(16));
//!     pager.update(&mut manager);
//! }
//! assert_eq!(pager.attached().len(), 9);
//! assert_eq!(pager.page(Location::ZERO), Some(&16));
//! ```

#![forbid(unsafe_code)]

pub mod block;
pub mod chunk;
pub mod config;
pub mod error;
pub mod pager;

// Re-export primary types
pub use block::{Block, BlockDef, BlockKind, BlockRegistry, BlockShape};
pub use chunk::{
    BoundaryFlags, Chunk, ChunkCache, ChunkDebugInfo, ChunkDims, ChunkGenerator, ChunkHandle,
    ChunkManager, ChunkManagerBuilder, ChunkManagerListener, ChunkMesh, ChunkMeshGenerator,
    ChunkRepository, ChunkResolver, ChunkStatus, CollisionMesh, DefaultFaceVisibility,
    EmptyGenerator, Face, FaceVisibility, LayerGenerator, Location, MeshContext, PagerStats,
    PipelineStats, StageKind,
};
pub use config::WorldConfig;
pub use error::{BoxError, ConfigError, TaskError};
pub use pager::{PageHandler, Pager, PagerConfig, PagerListener};
