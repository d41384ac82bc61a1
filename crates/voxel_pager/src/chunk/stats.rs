//! Statistics structs for pipeline operations.

/// Work performed by a single [`ChunkManager::update`](crate::ChunkManager::update).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Tasks handed to a pool or run inline this tick.
    pub submitted: usize,
    /// Results collected from the stage channels this tick.
    pub harvested: usize,
    /// Chunks newly inserted into the cache (load hit or generation).
    pub chunks_available: usize,
    /// Mesh results applied to cached chunks.
    pub chunks_updated: usize,
    /// Load misses moved to the generate queue.
    pub load_misses: usize,
    /// Failed or cancelled tasks whose request was dropped.
    pub tasks_failed: usize,
    /// Mesh results discarded because the chunk changed or left the cache.
    pub stale_meshes: usize,
    /// Entries evicted by periodic cache maintenance.
    pub maintenance_evictions: usize,
    /// Whether cache maintenance ran this tick.
    pub maintenance_ran: bool,
}

impl PipelineStats {
    /// Check if anything happened this tick.
    pub fn any_work(&self) -> bool {
        self.submitted > 0 || self.harvested > 0 || self.maintenance_ran
    }
}

/// Snapshot of pipeline state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkDebugInfo {
    pub cached_chunks: usize,
    pub cache_capacity: usize,
    /// Chunks in the cache still attached by a pager.
    pub attached_chunks: usize,
    pub load_queued: usize,
    pub load_in_flight: usize,
    pub generate_queued: usize,
    pub generate_in_flight: usize,
    pub mesh_queued: usize,
    pub mesh_in_flight: usize,
    /// Total cache evictions since creation.
    pub evictions: u64,
    /// Estimated memory held by cached chunks (bytes).
    pub memory_bytes: usize,
}

impl ChunkDebugInfo {
    /// No queued or in-flight work in any stage.
    pub fn is_idle(&self) -> bool {
        self.load_queued + self.load_in_flight
            + self.generate_queued + self.generate_in_flight
            + self.mesh_queued + self.mesh_in_flight
            == 0
    }

    /// Get memory usage in megabytes.
    pub fn memory_mb(&self) -> f32 {
        self.memory_bytes as f32 / (1024.0 * 1024.0)
    }
}

/// Work performed by a single [`Pager::update`](crate::Pager::update).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PagerStats {
    /// The focus moved into a new center cell this call.
    pub recentered: bool,
    pub attached: usize,
    pub detached: usize,
    pub updated: usize,
    /// Chunk requests issued to the manager.
    pub requested: usize,
    /// Attach attempts put back on the queue.
    pub deferred: usize,
}
