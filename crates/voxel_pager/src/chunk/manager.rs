//! ChunkManager - drives chunks through the load, generate and mesh stages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use glam::IVec3;
use parking_lot::RwLock;

use crate::block::Block;
use crate::config::WorldConfig;
use crate::error::{ConfigError, TaskError};
use super::cache::ChunkCache;
use super::chunk::{Chunk, ChunkHandle};
use super::face::FaceVisibility;
use super::location::Location;
use super::mesh::{ChunkMesh, CollisionMesh, MeshContext};
use super::provider::{
    ChunkGenerator, ChunkManagerListener, ChunkMeshGenerator, ChunkRepository, EmptyGenerator,
};
use super::resolver::ChunkResolver;
use super::stage::{Stage, StageKind};
use super::state::ChunkStatus;
use super::stats::{ChunkDebugInfo, PipelineStats};

/// Representations built by a mesh task from a chunk snapshot.
struct MeshOutput {
    mesh: Option<ChunkMesh>,
    collision: Option<CollisionMesh>,
    /// Cached chunk the snapshot was taken from.
    source: Weak<RwLock<Chunk>>,
    /// Block data version of the snapshot the output was built from.
    data_version: u64,
}

impl MeshOutput {
    /// Whether this output still describes `handle`: same cached chunk, same blocks.
    fn matches(&self, handle: &ChunkHandle, data_version: u64) -> bool {
        Weak::ptr_eq(&self.source, &Arc::downgrade(handle)) && self.data_version == data_version
    }
}

/// Builder for [`ChunkManager`].
pub struct ChunkManagerBuilder {
    config: WorldConfig,
    repository: Option<Arc<dyn ChunkRepository>>,
    generator: Option<Arc<dyn ChunkGenerator>>,
    mesh_generator: Option<Arc<dyn ChunkMeshGenerator>>,
    visibility: Option<Arc<dyn FaceVisibility>>,
}

impl ChunkManagerBuilder {
    /// Storage consulted first for every requested location.
    ///
    /// Without one, every request falls through to generation.
    pub fn repository(mut self, repository: impl ChunkRepository + 'static) -> Self {
        self.repository = Some(Arc::new(repository));
        self
    }

    /// Procedural source for locations storage does not have.
    ///
    /// Defaults to [`EmptyGenerator`], run inline.
    pub fn generator(mut self, generator: impl ChunkGenerator + 'static) -> Self {
        self.generator = Some(Arc::new(generator));
        self
    }

    /// Builder of render and collision representations.
    ///
    /// Without one, chunks pass through the mesh stage unchanged.
    pub fn mesh_generator(mut self, mesh_generator: impl ChunkMeshGenerator + 'static) -> Self {
        self.mesh_generator = Some(Arc::new(mesh_generator));
        self
    }

    /// Face-culling policy handed to the mesh generator.
    pub fn face_visibility(mut self, visibility: impl FaceVisibility + 'static) -> Self {
        self.visibility = Some(Arc::new(visibility));
        self
    }

    /// Validate the configuration, start the stage pools and create the cache.
    pub fn build(self) -> Result<ChunkManager, ConfigError> {
        self.config.validate()?;
        let cancel = Arc::new(AtomicBool::new(false));
        let cache = Arc::new(ChunkCache::new(self.config.cache_capacity()));
        let weak_cache: Weak<ChunkCache> = Arc::downgrade(&cache);
        let resolver: Weak<dyn ChunkResolver> = weak_cache;

        let mut mesh_context = MeshContext::new(self.config.chunk_dims(), self.config.block_scale());
        if let Some(visibility) = self.visibility {
            mesh_context = mesh_context.with_visibility(visibility);
        }

        log::debug!(
            "chunk manager: dims {:?}, cache {}, pools load={} generate={} mesh={}",
            self.config.chunk_dims(),
            self.config.cache_capacity(),
            self.config.load_threads(),
            self.config.generate_threads(),
            self.config.mesh_threads()
        );

        Ok(ChunkManager {
            load: Stage::new(StageKind::Load, self.config.load_threads(), Arc::clone(&cancel)),
            generate: Stage::new(StageKind::Generate, self.config.generate_threads(), Arc::clone(&cancel)),
            mesh: Stage::new(StageKind::Mesh, self.config.mesh_threads(), Arc::clone(&cancel)),
            config: self.config,
            cache,
            resolver,
            repository: self.repository,
            generator: self.generator,
            mesh_generator: self.mesh_generator,
            mesh_context,
            listeners: Vec::new(),
            cancel,
            since_maintenance: Duration::ZERO,
            shut_down: false,
        })
    }
}

/// Owner of the chunk cache and the three pipeline stages.
///
/// All methods are called from a single driver thread. Per-location state is
/// implicit in cache and queue membership:
///
/// ```text
/// unknown ──request──▶ loading ──hit──────────────▶ meshing ──▶ ready
///                         │                            ▲
///                         └──miss──▶ generating ───────┘
/// ```
pub struct ChunkManager {
    config: WorldConfig,
    cache: Arc<ChunkCache>,
    resolver: Weak<dyn ChunkResolver>,

    repository: Option<Arc<dyn ChunkRepository>>,
    generator: Option<Arc<dyn ChunkGenerator>>,
    mesh_generator: Option<Arc<dyn ChunkMeshGenerator>>,
    mesh_context: MeshContext,

    load: Stage<Option<Chunk>>,
    generate: Stage<Chunk>,
    mesh: Stage<MeshOutput>,

    listeners: Vec<Arc<dyn ChunkManagerListener>>,
    cancel: Arc<AtomicBool>,
    since_maintenance: Duration,
    shut_down: bool,
}

impl ChunkManager {
    pub fn builder(config: WorldConfig) -> ChunkManagerBuilder {
        ChunkManagerBuilder {
            config,
            repository: None,
            generator: None,
            mesh_generator: None,
            visibility: None,
        }
    }

    /// Manager with no collaborators: every chunk is generated empty.
    pub fn new(config: WorldConfig) -> Result<Self, ConfigError> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ChunkCache> {
        &self.cache
    }

    pub fn mesh_context(&self) -> &MeshContext {
        &self.mesh_context
    }

    pub fn add_listener(&mut self, listener: Arc<dyn ChunkManagerListener>) {
        self.listeners.push(listener);
    }

    /// Unregister a listener previously passed to [`add_listener`](Self::add_listener).
    pub fn remove_listener(&mut self, listener: &Arc<dyn ChunkManagerListener>) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| !Arc::ptr_eq(l, listener));
        self.listeners.len() != before
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Ask for a chunk to be loaded or generated and meshed.
    ///
    /// No-op if the chunk is cached or already on its way. Returns true if
    /// the location entered the load queue.
    pub fn request(&mut self, location: Location) -> bool {
        if self.cache.contains(location)
            || self.load.contains(location)
            || self.generate.contains(location)
        {
            return false;
        }
        self.load.enqueue(location)
    }

    /// Cached chunk at a location. Never blocks on pipeline work.
    pub fn get(&self, location: Location) -> Option<ChunkHandle> {
        self.cache.get(location)
    }

    /// Queue a cached chunk for a mesh rebuild.
    pub fn request_update(&mut self, location: Location) -> bool {
        if !self.cache.contains(location) {
            log::warn!("request_update: chunk {} is not cached", location);
            return false;
        }
        self.mesh.enqueue(location)
    }

    pub fn request_update_chunk(&mut self, chunk: &ChunkHandle) -> bool {
        let location = chunk.read().location();
        self.request_update(location)
    }

    /// Evict a chunk from the cache.
    pub fn remove(&mut self, location: Location) -> bool {
        self.mesh.unqueue(location);
        if !self.cache.evict(location) {
            log::warn!("remove: chunk {} is not cached", location);
            return false;
        }
        true
    }

    pub fn remove_chunk(&mut self, chunk: &ChunkHandle) -> bool {
        let location = chunk.read().location();
        self.remove(location)
    }

    /// Pipeline position of a location.
    pub fn status(&self, location: Location) -> ChunkStatus {
        if self.cache.contains(location) {
            if self.mesh.contains(location) {
                ChunkStatus::Meshing
            } else {
                ChunkStatus::Ready
            }
        } else if self.generate.contains(location) {
            ChunkStatus::Generating
        } else if self.load.contains(location) {
            ChunkStatus::Loading
        } else {
            ChunkStatus::Unknown
        }
    }

    // ========================================================================
    // Block Access
    // ========================================================================

    /// Block at a world block coordinate, if its chunk is cached.
    pub fn block_at(&self, block: IVec3) -> Option<Block> {
        let dims = self.config.chunk_dims();
        let handle = self.cache.peek(Location::from_block(block, dims))?;
        let [x, y, z] = Location::block_to_local(block, dims);
        let chunk = handle.read();
        chunk.block_at(x, y, z).cloned()
    }

    /// Edit a block in a cached chunk and queue the affected meshes.
    ///
    /// Neighbors sharing the edited boundary are remeshed too, if cached.
    pub fn set_block(&mut self, block: IVec3, value: Option<Block>) -> bool {
        let dims = self.config.chunk_dims();
        let location = Location::from_block(block, dims);
        let Some(handle) = self.cache.peek(location) else {
            log::warn!("set_block: chunk {} is not cached", location);
            return false;
        };
        let [x, y, z] = Location::block_to_local(block, dims);
        let boundary = {
            let mut chunk = handle.write();
            if !chunk.set_block(x, y, z, value) {
                return false;
            }
            chunk.boundary_flags(x, y, z)
        };

        self.mesh.enqueue(location);
        for [dx, dy, dz] in boundary.affected_neighbors() {
            let neighbor = location.offset(dx, dy, dz);
            if self.cache.contains(neighbor) {
                self.mesh.enqueue(neighbor);
            }
        }
        true
    }

    /// Write a cached chunk to the repository.
    pub fn save(&self, location: Location) -> bool {
        let Some(repository) = &self.repository else {
            log::warn!("save: no repository configured");
            return false;
        };
        let Some(handle) = self.cache.peek(location) else {
            log::warn!("save: chunk {} is not cached", location);
            return false;
        };
        let chunk = handle.read();
        repository.save(&chunk)
    }

    // ========================================================================
    // Frame Update
    // ========================================================================

    /// Advance the pipeline by one tick.
    ///
    /// Performs at most one harvest and one submission per stage, in the
    /// order mesh, load, generate, then runs cache maintenance once the
    /// configured interval has elapsed. Stages without a pool or without a
    /// collaborator run their unit of work inline during submission.
    pub fn update(&mut self, dt: Duration) -> PipelineStats {
        let mut stats = PipelineStats::default();

        self.harvest_mesh(&mut stats);
        self.submit_mesh(&mut stats);
        self.harvest_load(&mut stats);
        self.submit_load(&mut stats);
        self.harvest_generate(&mut stats);
        self.submit_generate(&mut stats);

        self.since_maintenance += dt;
        if self.since_maintenance >= self.config.maintenance_interval() {
            self.since_maintenance = Duration::ZERO;
            stats.maintenance_evictions = self.cache.maintain();
            stats.maintenance_ran = true;
        }

        stats
    }

    fn harvest_mesh(&mut self, stats: &mut PipelineStats) {
        let Some((location, result)) = self.mesh.harvest() else {
            return;
        };
        stats.harvested += 1;
        let output = match result {
            Ok(output) => output,
            Err(err) => return self.drop_task(err, stats),
        };

        let Some(handle) = self.cache.peek(location) else {
            log::debug!("mesh for {} discarded: chunk left the cache", location);
            stats.stale_meshes += 1;
            return;
        };
        {
            let mut chunk = handle.write();
            if !output.matches(&handle, chunk.data_version()) {
                drop(chunk);
                log::debug!("mesh for {} is stale, rebuilding", location);
                stats.stale_meshes += 1;
                self.mesh.enqueue(location);
                return;
            }
            let mut mesh = output.mesh;
            if let Some(mesh) = &mut mesh {
                mesh.data_version = output.data_version;
            }
            chunk.set_mesh(mesh);
            chunk.set_collision(output.collision);
        }
        self.cache.put(Arc::clone(&handle));
        stats.chunks_updated += 1;
        for listener in &self.listeners {
            listener.on_chunk_updated(&handle);
        }
    }

    fn submit_mesh(&mut self, stats: &mut PipelineStats) {
        let Some(location) = self.mesh.dequeue() else {
            return;
        };
        let Some(handle) = self.cache.peek(location) else {
            log::debug!("mesh for {} skipped: chunk left the cache", location);
            return;
        };
        stats.submitted += 1;
        let source = Arc::downgrade(&handle);

        let Some(generator) = &self.mesh_generator else {
            let data_version = handle.read().data_version();
            self.mesh.run_inline(location, move || {
                Ok(MeshOutput { mesh: None, collision: None, source, data_version })
            });
            return;
        };

        let generator = Arc::clone(generator);
        let context = self.mesh_context.clone();
        let mut snapshot = handle.read().clone();
        self.mesh.submit(location, move || {
            let data_version = snapshot.data_version();
            generator
                .build(&mut snapshot, &context)
                .map_err(|source| TaskError::Mesh { location, source })?;
            Ok(MeshOutput {
                mesh: snapshot.take_mesh(),
                collision: snapshot.take_collision(),
                source,
                data_version,
            })
        });
    }

    fn harvest_load(&mut self, stats: &mut PipelineStats) {
        let Some((location, result)) = self.load.harvest() else {
            return;
        };
        stats.harvested += 1;
        match result {
            Ok(Some(mut chunk)) => {
                if chunk.location() != location || chunk.dims() != self.config.chunk_dims() {
                    log::error!(
                        "repository returned chunk {} with dims {:?} for {}; dropping",
                        chunk.location(),
                        chunk.dims(),
                        location
                    );
                    stats.tasks_failed += 1;
                    self.notify_dropped(location);
                    return;
                }
                chunk.update_flags();
                self.insert_available(chunk, stats);
            }
            Ok(None) => {
                stats.load_misses += 1;
                self.generate.enqueue(location);
            }
            Err(err) => self.drop_task(err, stats),
        }
    }

    fn submit_load(&mut self, stats: &mut PipelineStats) {
        let Some(location) = self.load.dequeue() else {
            return;
        };
        stats.submitted += 1;
        let dims = self.config.chunk_dims();
        match &self.repository {
            Some(repository) => {
                let repository = Arc::clone(repository);
                self.load.submit(location, move || {
                    repository
                        .load(location, dims)
                        .map_err(|source| TaskError::Load { location, source })
                });
            }
            None => self.load.run_inline(location, || Ok(None)),
        }
    }

    fn harvest_generate(&mut self, stats: &mut PipelineStats) {
        let Some((location, result)) = self.generate.harvest() else {
            return;
        };
        stats.harvested += 1;
        match result {
            Ok(mut chunk) => {
                chunk.update_flags();
                self.insert_available(chunk, stats);
            }
            Err(err) => self.drop_task(err, stats),
        }
    }

    fn submit_generate(&mut self, stats: &mut PipelineStats) {
        let Some(location) = self.generate.dequeue() else {
            return;
        };
        stats.submitted += 1;
        let dims = self.config.chunk_dims();
        match &self.generator {
            Some(generator) => {
                let generator = Arc::clone(generator);
                self.generate
                    .submit(location, move || Ok(generator.generate(location, dims)));
            }
            None => self
                .generate
                .run_inline(location, move || Ok(EmptyGenerator.generate(location, dims))),
        }
    }

    /// Cache a freshly loaded or generated chunk and queue its first mesh.
    ///
    /// A mesh still running for an earlier chunk at this location is
    /// discarded on harvest and this one is queued after it.
    fn insert_available(&mut self, mut chunk: Chunk, stats: &mut PipelineStats) {
        let location = chunk.location();
        chunk.set_resolver(self.resolver.clone());
        let handle = Arc::new(RwLock::new(chunk));
        self.cache.put(Arc::clone(&handle));
        stats.chunks_available += 1;
        for listener in &self.listeners {
            listener.on_chunk_available(&handle);
        }
        self.mesh.enqueue(location);
    }

    fn drop_task(&self, err: TaskError, stats: &mut PipelineStats) {
        if err.is_cancelled() {
            log::debug!("{}", err);
        } else {
            log::error!("{}; request dropped", err);
        }
        stats.tasks_failed += 1;
        self.notify_dropped(err.location());
    }

    fn notify_dropped(&self, location: Location) {
        for listener in &self.listeners {
            listener.on_chunk_dropped(location);
        }
    }

    // ========================================================================
    // Debug / Teardown
    // ========================================================================

    pub fn debug_info(&self) -> ChunkDebugInfo {
        let mut info = ChunkDebugInfo {
            cache_capacity: self.cache.capacity(),
            load_queued: self.load.queued_len(),
            load_in_flight: self.load.in_flight_len(),
            generate_queued: self.generate.queued_len(),
            generate_in_flight: self.generate.in_flight_len(),
            mesh_queued: self.mesh.queued_len(),
            mesh_in_flight: self.mesh.in_flight_len(),
            evictions: self.cache.eviction_count(),
            ..Default::default()
        };
        for location in self.cache.locations() {
            let Some(handle) = self.cache.peek(location) else {
                continue;
            };
            let chunk = handle.read();
            info.cached_chunks += 1;
            info.memory_bytes += chunk.memory_bytes();
            if chunk.is_attached() {
                info.attached_chunks += 1;
            }
        }
        info
    }

    /// Stop all pools without draining, clear every queue and evict the
    /// whole cache.
    pub fn shutdown(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.cancel.store(true, Ordering::Release);
        self.load.shutdown();
        self.generate.shutdown();
        self.mesh.shutdown();
        self.cache.evict_all();
        log::debug!("chunk manager shut down");
    }
}

impl Drop for ChunkManager {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockDef;
    use crate::chunk::provider::LayerGenerator;
    use parking_lot::Mutex;

    fn stone() -> Block {
        Block::new(BlockDef::solid("stone"))
    }

    fn config() -> WorldConfig {
        WorldConfig::single_threaded()
            .with_chunk_dims(2, 2, 2)
            .unwrap()
            .with_grid_size(3, 3, 3)
            .unwrap()
            .with_cache_capacity(64)
            .unwrap()
    }

    fn tick(manager: &mut ChunkManager, n: usize) {
        for _ in 0..n {
            manager.update(Duration::from_millis(16));
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<(&'static str, Location)>>,
    }

    impl ChunkManagerListener for Recorder {
        fn on_chunk_updated(&self, chunk: &ChunkHandle) {
            self.events.lock().push(("updated", chunk.read().location()));
        }

        fn on_chunk_available(&self, chunk: &ChunkHandle) {
            self.events.lock().push(("available", chunk.read().location()));
        }

        fn on_chunk_dropped(&self, location: Location) {
            self.events.lock().push(("dropped", location));
        }
    }

    #[test]
    fn rejects_invalid_config() {
        let config: WorldConfig = toml::from_str("grid_size = [2, 2, 2]").unwrap();
        assert!(ChunkManager::new(config).is_err());
    }

    #[test]
    fn inline_request_walks_every_stage() {
        let mut manager = ChunkManager::builder(config())
            .generator(LayerGenerator::new(stone(), [0]))
            .build()
            .unwrap();
        let loc = Location::ZERO;

        assert!(manager.request(loc));
        assert_eq!(manager.status(loc), ChunkStatus::Loading);

        tick(&mut manager, 1); // load miss submitted inline
        assert_eq!(manager.status(loc), ChunkStatus::Loading);
        tick(&mut manager, 1); // miss harvested, generation runs inline
        assert_eq!(manager.status(loc), ChunkStatus::Generating);
        tick(&mut manager, 1); // generated chunk cached, mesh queued
        assert_eq!(manager.status(loc), ChunkStatus::Meshing);
        tick(&mut manager, 2);
        assert_eq!(manager.status(loc), ChunkStatus::Ready);

        let chunk = manager.get(loc).unwrap();
        assert!(!chunk.read().is_empty());
        assert!(manager.debug_info().is_idle());
    }

    #[test]
    fn request_is_idempotent() {
        let mut manager = ChunkManager::new(config()).unwrap();
        assert!(manager.request(Location::ZERO));
        assert!(!manager.request(Location::ZERO));
        assert_eq!(manager.debug_info().load_queued, 1);

        tick(&mut manager, 10);
        assert!(manager.get(Location::ZERO).is_some());
        assert!(!manager.request(Location::ZERO));
    }

    #[test]
    fn listener_order() {
        let mut manager = ChunkManager::new(config()).unwrap();
        let recorder = Arc::new(Recorder::default());
        manager.add_listener(recorder.clone());

        manager.request(Location::new(1, 2, 3));
        tick(&mut manager, 10);

        let events = recorder.events.lock().clone();
        assert_eq!(
            events,
            vec![("available", Location::new(1, 2, 3)), ("updated", Location::new(1, 2, 3))]
        );
    }

    #[test]
    fn missing_entity_operations_are_noops() {
        let mut manager = ChunkManager::new(config()).unwrap();
        assert!(!manager.remove(Location::ZERO));
        assert!(!manager.request_update(Location::ZERO));
        assert!(!manager.set_block(IVec3::ZERO, Some(stone())));
        assert!(!manager.save(Location::ZERO));
        assert_eq!(manager.status(Location::ZERO), ChunkStatus::Unknown);
    }

    #[test]
    fn remove_clears_chunk() {
        let mut manager = ChunkManager::new(config()).unwrap();
        manager.request(Location::ZERO);
        tick(&mut manager, 10);
        let chunk = manager.get(Location::ZERO).unwrap();

        assert!(manager.remove_chunk(&chunk));
        assert!(manager.get(Location::ZERO).is_none());
        assert!(chunk.read().is_cleared());
    }

    #[test]
    fn set_block_remeshes_boundary_neighbors() {
        let mut manager = ChunkManager::new(config()).unwrap();
        for loc in [Location::ZERO, Location::new(-1, 0, 0), Location::new(0, 1, 0)] {
            manager.request(loc);
        }
        tick(&mut manager, 30);
        assert!(manager.debug_info().is_idle());

        // Local (0, 1, 1) touches -X, +Y and +Z.
        assert!(manager.set_block(IVec3::new(0, 1, 1), Some(stone())));
        assert_eq!(manager.block_at(IVec3::new(0, 1, 1)), Some(stone()));

        let info = manager.debug_info();
        assert_eq!(info.mesh_queued, 3);
        assert_eq!(manager.status(Location::new(-1, 0, 0)), ChunkStatus::Meshing);
        assert_eq!(manager.status(Location::new(0, 1, 0)), ChunkStatus::Meshing);
    }

    #[test]
    fn resolver_reaches_neighbors() {
        let mut manager = ChunkManager::builder(config())
            .generator(LayerGenerator::new(stone(), [0, 1]))
            .build()
            .unwrap();
        manager.request(Location::ZERO);
        manager.request(Location::new(1, 0, 0));
        tick(&mut manager, 20);

        let chunk = manager.get(Location::ZERO).unwrap();
        let chunk = chunk.read();
        assert!(chunk.is_full());
        assert_eq!(chunk.block_at_relative(2, 0, 0), Some(stone()));
        assert_eq!(chunk.block_at_relative(0, 0, -1), None);
    }

    #[test]
    fn shutdown_evicts_everything() {
        let mut manager = ChunkManager::new(config()).unwrap();
        manager.request(Location::ZERO);
        tick(&mut manager, 10);
        let chunk = manager.get(Location::ZERO).unwrap();
        let cache = Arc::clone(manager.cache());

        manager.shutdown();

        assert!(cache.is_empty());
        assert!(chunk.read().is_cleared());
    }

    #[test]
    fn maintenance_runs_on_interval() {
        let config = config().with_maintenance_interval(Duration::from_millis(100));
        let mut manager = ChunkManager::new(config).unwrap();

        assert!(!manager.update(Duration::from_millis(60)).maintenance_ran);
        assert!(manager.update(Duration::from_millis(60)).maintenance_ran);
        assert!(!manager.update(Duration::from_millis(60)).maintenance_ran);
    }
}
