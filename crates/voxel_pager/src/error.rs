//! Error types for configuration and pipeline tasks.

use thiserror::Error;

use crate::chunk::location::Location;
use crate::chunk::stage::StageKind;

/// Error type returned by external collaborators (repositories, mesh generators).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Invalid configuration, reported at the point the value is set.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A chunk extent was zero.
    #[error("chunk dimensions must be positive on every axis, got {dims:?}")]
    InvalidChunkDims { dims: [u32; 3] },

    /// A grid extent was zero or even, so the grid has no center cell.
    #[error("grid size must be positive and odd on every axis ((n - 1) % 2 == 0), got {grid:?}")]
    InvalidGridSize { grid: [u32; 3] },

    /// Block scale was zero, negative, or not finite.
    #[error("block scale must be a positive finite number, got {scale}")]
    InvalidBlockScale { scale: f32 },

    /// Cache capacity of zero cannot hold any chunk.
    #[error("cache capacity must be at least 1")]
    InvalidCacheCapacity,

    /// Lower paging bound exceeds the upper bound on some axis.
    #[error("pager bounds are inverted: lower {lower} is above upper {upper}")]
    InvalidBounds { lower: Location, upper: Location },

    /// The TOML source could not be parsed.
    #[error("failed to parse world config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Failure of a single load, generate, or mesh task.
///
/// Produced on worker threads and carried back to the driver as data.
/// The driver logs it and drops the request; it never reaches the caller
/// of [`ChunkManager::request`](crate::ChunkManager::request).
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("loading chunk {location} failed: {source}")]
    Load {
        location: Location,
        #[source]
        source: BoxError,
    },

    #[error("meshing chunk {location} failed: {source}")]
    Mesh {
        location: Location,
        #[source]
        source: BoxError,
    },

    #[error("{stage} task for chunk {location} panicked: {message}")]
    Panicked {
        stage: StageKind,
        location: Location,
        message: String,
    },

    #[error("{stage} task for chunk {location} was cancelled")]
    Cancelled { stage: StageKind, location: Location },
}

impl TaskError {
    /// Location the failed task was working on.
    pub fn location(&self) -> Location {
        match self {
            TaskError::Load { location, .. }
            | TaskError::Mesh { location, .. }
            | TaskError::Panicked { location, .. }
            | TaskError::Cancelled { location, .. } => *location,
        }
    }

    /// Whether the task was discarded by shutdown rather than failing.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskError::Cancelled { .. })
    }
}
