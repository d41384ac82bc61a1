//! World configuration: chunk extents, paging grid, cache and pool sizing.
//!
//! Every setter validates its input and fails fast with a [`ConfigError`],
//! so a [`WorldConfig`] that exists is always usable.

use std::time::Duration;

use glam::Vec3;
use serde::Deserialize;

use crate::chunk::dims::ChunkDims;
use crate::error::ConfigError;

/// Configuration shared by the chunk pipeline and pagers.
///
/// Loadable from TOML; missing keys fall back to [`Default`].
///
/// ```
/// use voxel_pager::WorldConfig;
///
/// let config = WorldConfig::default()
///     .with_chunk_dims(2, 2, 2).unwrap()
///     .with_grid_size(3, 3, 3).unwrap();
/// assert_eq!(config.recommended_cache_capacity(), 27);
/// assert!(WorldConfig::default().with_grid_size(4, 3, 3).is_err());
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldConfig {
    chunk_dims: [u32; 3],
    grid_size: [u32; 3],
    block_scale: f32,
    cache_capacity: usize,
    load_threads: usize,
    generate_threads: usize,
    mesh_threads: usize,
    maintenance_interval_ms: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            chunk_dims: [16, 16, 16],
            grid_size: [9, 5, 9],
            block_scale: 1.0,
            cache_capacity: 512,
            load_threads: 1,
            generate_threads: 2,
            mesh_threads: 2,
            maintenance_interval_ms: 1000,
        }
    }
}

impl WorldConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration with every stage executed inline on the driver thread.
    pub fn single_threaded() -> Self {
        Self {
            load_threads: 0,
            generate_threads: 0,
            mesh_threads: 0,
            ..Self::default()
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: WorldConfig = toml::from_str(source)?;
        config.validate()?;
        config.warn_if_cache_undersized();
        Ok(config)
    }

    /// Check every field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_chunk_dims(self.chunk_dims)?;
        validate_grid_size(self.grid_size)?;
        validate_block_scale(self.block_scale)?;
        if self.cache_capacity == 0 {
            return Err(ConfigError::InvalidCacheCapacity);
        }
        Ok(())
    }

    pub fn with_chunk_dims(mut self, x: u32, y: u32, z: u32) -> Result<Self, ConfigError> {
        validate_chunk_dims([x, y, z])?;
        self.chunk_dims = [x, y, z];
        Ok(self)
    }

    pub fn with_grid_size(mut self, x: u32, y: u32, z: u32) -> Result<Self, ConfigError> {
        validate_grid_size([x, y, z])?;
        self.grid_size = [x, y, z];
        self.warn_if_cache_undersized();
        Ok(self)
    }

    pub fn with_block_scale(mut self, scale: f32) -> Result<Self, ConfigError> {
        validate_block_scale(scale)?;
        self.block_scale = scale;
        Ok(self)
    }

    /// Set the cache capacity in chunks.
    ///
    /// Values below [`recommended_cache_capacity`](Self::recommended_cache_capacity)
    /// are accepted with a warning: the pager's working set will not fit.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::InvalidCacheCapacity);
        }
        self.cache_capacity = capacity;
        self.warn_if_cache_undersized();
        Ok(self)
    }

    /// Worker counts for the load, generate and mesh stages.
    ///
    /// Zero runs that stage inline on the driver thread.
    pub fn with_pool_sizes(mut self, load: usize, generate: usize, mesh: usize) -> Self {
        self.load_threads = load;
        self.generate_threads = generate;
        self.mesh_threads = mesh;
        self
    }

    pub fn with_maintenance_interval(mut self, interval: Duration) -> Self {
        self.maintenance_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn chunk_dims(&self) -> ChunkDims {
        ChunkDims::from(self.chunk_dims)
    }

    pub fn grid_size(&self) -> [u32; 3] {
        self.grid_size
    }

    pub fn block_scale(&self) -> f32 {
        self.block_scale
    }

    pub fn cache_capacity(&self) -> usize {
        self.cache_capacity
    }

    pub fn load_threads(&self) -> usize {
        self.load_threads
    }

    pub fn generate_threads(&self) -> usize {
        self.generate_threads
    }

    pub fn mesh_threads(&self) -> usize {
        self.mesh_threads
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_millis(self.maintenance_interval_ms)
    }

    /// World-space extent of one chunk (chunk dimensions times block scale).
    pub fn page_size(&self) -> Vec3 {
        self.chunk_dims().as_vec3() * self.block_scale
    }

    /// Smallest cache that holds a full paging grid.
    pub fn recommended_cache_capacity(&self) -> usize {
        self.grid_size.iter().map(|&n| n as usize).product()
    }

    fn warn_if_cache_undersized(&self) {
        let recommended = self.recommended_cache_capacity();
        if self.cache_capacity < recommended {
            log::warn!(
                "cache capacity {} is below the recommended minimum {} for grid {:?}",
                self.cache_capacity,
                recommended,
                self.grid_size
            );
        }
    }
}

pub(crate) fn validate_chunk_dims(dims: [u32; 3]) -> Result<(), ConfigError> {
    if dims.iter().any(|&d| d == 0) {
        return Err(ConfigError::InvalidChunkDims { dims });
    }
    Ok(())
}

pub(crate) fn validate_grid_size(grid: [u32; 3]) -> Result<(), ConfigError> {
    if grid.iter().any(|&n| n == 0 || (n - 1) % 2 != 0) {
        return Err(ConfigError::InvalidGridSize { grid });
    }
    Ok(())
}

fn validate_block_scale(scale: f32) -> Result<(), ConfigError> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(ConfigError::InvalidBlockScale { scale });
    }
    Ok(())
}
