//! Pager - keeps a moving neighborhood of pages attached.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use crossbeam_channel::{Receiver, Sender};
use glam::Vec3;
use parking_lot::RwLock;

use crate::chunk::{
    Chunk, ChunkHandle, ChunkManager, ChunkManagerListener, Location, PagerStats, UniqueQueue,
};
use crate::error::ConfigError;
use super::grid::PagerConfig;

/// Builds and displays the representation `T` of a chunk.
pub trait PageHandler<T> {
    /// Build a page for a cached chunk.
    ///
    /// `None` means the page cannot be built yet (for example the mesh has
    /// not arrived); the pager retries on a later update.
    fn create_page(&mut self, chunk: &Chunk) -> Option<T>;

    fn attach_page(&mut self, location: Location, page: &T);

    fn detach_page(&mut self, location: Location, page: &T);
}

/// Observer of page changes.
pub trait PagerListener<T> {
    fn on_page_attached(&self, _location: Location, _page: &T) {}

    fn on_page_detached(&self, _location: Location, _page: &T) {}

    fn on_page_updated(&self, _location: Location, _old: &T, _new: &T) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ChunkEvent {
    Available(Location),
    Updated(Location),
    Dropped(Location),
}

/// Forwards manager notifications into the pager's event channel.
struct EventForwarder {
    tx: Sender<ChunkEvent>,
}

impl ChunkManagerListener for EventForwarder {
    fn on_chunk_updated(&self, chunk: &ChunkHandle) {
        let _ = self.tx.send(ChunkEvent::Updated(chunk.read().location()));
    }

    fn on_chunk_available(&self, chunk: &ChunkHandle) {
        let _ = self.tx.send(ChunkEvent::Available(chunk.read().location()));
    }

    fn on_chunk_dropped(&self, location: Location) {
        let _ = self.tx.send(ChunkEvent::Dropped(location));
    }
}

/// Keeps the pages of a cube-shaped neighborhood attached around a focus.
///
/// Each [`update`](Pager::update) performs at most one detach, one update
/// and one attach, so a large jump of the focus is spread over many calls
/// instead of stalling one.
pub struct Pager<T, H> {
    config: PagerConfig,
    handler: H,

    focus: Vec3,
    /// `None` until the first update, or after bounds change.
    center: Option<Location>,
    desired: HashSet<Location>,

    attached: HashMap<Location, T>,
    /// Chunk each attached page was built from.
    sources: HashMap<Location, Weak<RwLock<Chunk>>>,
    pending_attach: UniqueQueue,
    pending_detach: UniqueQueue,
    pending_update: UniqueQueue,
    requested: HashSet<Location>,

    events: Receiver<ChunkEvent>,
    forwarder: Arc<dyn ChunkManagerListener>,
    listeners: Vec<Box<dyn PagerListener<T>>>,
}

impl<T, H: PageHandler<T>> Pager<T, H> {
    /// Create a pager and register it for notifications from `manager`.
    pub fn new(config: PagerConfig, handler: H, manager: &mut ChunkManager) -> Self {
        let (tx, events) = crossbeam_channel::unbounded();
        let forwarder: Arc<dyn ChunkManagerListener> = Arc::new(EventForwarder { tx });
        manager.add_listener(Arc::clone(&forwarder));
        Self {
            config,
            handler,
            focus: Vec3::ZERO,
            center: None,
            desired: HashSet::new(),
            attached: HashMap::new(),
            sources: HashMap::new(),
            pending_attach: UniqueQueue::new(),
            pending_detach: UniqueQueue::new(),
            pending_update: UniqueQueue::new(),
            requested: HashSet::new(),
            events,
            forwarder,
            listeners: Vec::new(),
        }
    }

    pub fn add_listener(&mut self, listener: impl PagerListener<T> + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn config(&self) -> &PagerConfig {
        &self.config
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Move the focus. Takes effect on the next update.
    pub fn set_focus(&mut self, focus: Vec3) {
        self.focus = focus;
    }

    pub fn focus(&self) -> Vec3 {
        self.focus
    }

    /// Change the clipping bounds. The desired set is rebuilt on the next update.
    pub fn set_bounds(
        &mut self,
        lower: Option<Location>,
        upper: Option<Location>,
    ) -> Result<(), ConfigError> {
        self.config.set_bounds(lower, upper)?;
        self.center = None;
        Ok(())
    }

    /// Center cell of the current desired set.
    pub fn center(&self) -> Option<Location> {
        self.center
    }

    pub fn desired(&self) -> &HashSet<Location> {
        &self.desired
    }

    pub fn attached(&self) -> &HashMap<Location, T> {
        &self.attached
    }

    pub fn is_attached(&self, location: Location) -> bool {
        self.attached.contains_key(&location)
    }

    pub fn page(&self, location: Location) -> Option<&T> {
        self.attached.get(&location)
    }

    pub fn pending_attach_len(&self) -> usize {
        self.pending_attach.len()
    }

    pub fn pending_detach_len(&self) -> usize {
        self.pending_detach.len()
    }

    pub fn pending_update_len(&self) -> usize {
        self.pending_update.len()
    }

    /// Whether the attached set equals the desired set around the current focus.
    pub fn is_converged(&self) -> bool {
        self.center == Some(self.config.center_for(self.focus))
            && self.pending_detach.is_empty()
            && self.pending_attach.is_empty()
            && self.attached.len() == self.desired.len()
            && self.attached.keys().all(|cell| self.desired.contains(cell))
    }

    // ========================================================================
    // Update
    // ========================================================================

    /// Converge one step toward the desired neighborhood.
    pub fn update(&mut self, manager: &mut ChunkManager) -> PagerStats {
        let mut stats = PagerStats::default();
        self.drain_events();

        let center = self.config.center_for(self.focus);
        if self.center != Some(center) {
            self.recenter(center);
            stats.recentered = true;
        }

        self.detach_one(manager, &mut stats);
        self.update_one(manager, &mut stats);
        self.attach_one(manager, &mut stats);
        stats
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                ChunkEvent::Available(location) | ChunkEvent::Dropped(location) => {
                    self.requested.remove(&location);
                }
                ChunkEvent::Updated(location) => {
                    if self.attached.contains_key(&location) {
                        self.pending_update.push(location);
                    }
                }
            }
        }
    }

    fn recenter(&mut self, center: Location) {
        let cells = self.config.desired_cells(center);
        self.desired = cells.iter().copied().collect();
        self.center = Some(center);

        let mut leaving: Vec<Location> = self
            .attached
            .keys()
            .copied()
            .filter(|cell| !self.desired.contains(cell))
            .collect();
        // Farthest first.
        leaving.sort_by_key(|&cell| std::cmp::Reverse((center.distance_squared(cell), cell)));
        self.pending_detach.clear();
        for cell in leaving {
            self.pending_detach.push(cell);
        }

        self.pending_attach.clear();
        for &cell in &cells {
            if !self.attached.contains_key(&cell) {
                self.pending_attach.push(cell);
            }
        }

        let desired = &self.desired;
        self.pending_update.retain(|cell| desired.contains(&cell));
        self.requested.retain(|cell| desired.contains(cell));

        log::debug!(
            "pager recentered on {}: {} desired, {} to attach, {} to detach",
            center,
            self.desired.len(),
            self.pending_attach.len(),
            self.pending_detach.len()
        );
    }

    fn detach_one(&mut self, manager: &mut ChunkManager, stats: &mut PagerStats) {
        let Some(location) = self.pending_detach.pop() else {
            return;
        };
        let Some(page) = self.attached.remove(&location) else {
            return;
        };
        self.release(location, &page, manager);
        stats.detached += 1;
        for listener in &self.listeners {
            listener.on_page_detached(location, &page);
        }
    }

    fn update_one(&mut self, manager: &mut ChunkManager, stats: &mut PagerStats) {
        let Some(location) = self.pending_update.pop() else {
            return;
        };
        let Some(old) = self.attached.remove(&location) else {
            return;
        };
        let source = self.sources.remove(&location);
        self.handler.detach_page(location, &old);

        let handle = manager.get(location);
        let rebuilt = handle.as_ref().and_then(|handle| {
            let chunk = handle.read();
            self.handler.create_page(&chunk)
        });
        match (handle, rebuilt) {
            (Some(handle), Some(new)) => {
                let weak = Arc::downgrade(&handle);
                // The chunk may have been evicted and reloaded since attach.
                if !source.as_ref().is_some_and(|source| Weak::ptr_eq(source, &weak)) {
                    mark_source_detached(source);
                    handle.write().mark_attached();
                }
                self.handler.attach_page(location, &new);
                stats.updated += 1;
                for listener in &self.listeners {
                    listener.on_page_updated(location, &old, &new);
                }
                self.attached.insert(location, new);
                self.sources.insert(location, weak);
            }
            _ => {
                mark_source_detached(source);
                log::debug!("page {} could not be rebuilt, reattaching later", location);
                for listener in &self.listeners {
                    listener.on_page_detached(location, &old);
                }
                self.pending_attach.push(location);
            }
        }
    }

    fn attach_one(&mut self, manager: &mut ChunkManager, stats: &mut PagerStats) {
        let Some(location) = self.pending_attach.pop() else {
            return;
        };
        if self.attached.contains_key(&location) || !self.desired.contains(&location) {
            return;
        }

        let Some(handle) = manager.get(location) else {
            if self.requested.insert(location) {
                manager.request(location);
                stats.requested += 1;
            }
            self.pending_attach.push(location);
            stats.deferred += 1;
            return;
        };

        let page = {
            let chunk = handle.read();
            self.handler.create_page(&chunk)
        };
        let Some(page) = page else {
            self.pending_attach.push(location);
            stats.deferred += 1;
            return;
        };

        handle.write().mark_attached();
        self.handler.attach_page(location, &page);
        self.requested.remove(&location);
        stats.attached += 1;
        for listener in &self.listeners {
            listener.on_page_attached(location, &page);
        }
        self.attached.insert(location, page);
        self.sources.insert(location, Arc::downgrade(&handle));
    }

    /// Detach a page that has already left the attached map.
    ///
    /// Only the chunk the page was built from is released; a newer chunk
    /// cached at the same location is left alone.
    fn release(&mut self, location: Location, page: &T, manager: &mut ChunkManager) {
        self.handler.detach_page(location, page);
        let Some(source) = self.sources.remove(&location).and_then(|source| source.upgrade()) else {
            return;
        };
        source.write().mark_detached();
        let cached = manager.cache().peek(location);
        if self.config.evict_on_detach() && cached.is_some_and(|cached| Arc::ptr_eq(&cached, &source)) {
            manager.remove(location);
        }
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Detach every page at once and forget all pending work.
    ///
    /// The next update rebuilds the neighborhood from scratch.
    pub fn detach_all(&mut self, manager: &mut ChunkManager) {
        let pages: Vec<(Location, T)> = self.attached.drain().collect();
        for (location, page) in &pages {
            self.release(*location, page, manager);
            for listener in &self.listeners {
                listener.on_page_detached(*location, page);
            }
        }
        self.pending_attach.clear();
        self.pending_detach.clear();
        self.pending_update.clear();
        self.requested.clear();
        self.sources.clear();
        self.desired.clear();
        self.center = None;
    }

    /// Detach everything and stop listening to `manager`.
    pub fn close(mut self, manager: &mut ChunkManager) {
        self.detach_all(manager);
        manager.remove_listener(&self.forwarder);
    }
}

fn mark_source_detached(source: Option<Weak<RwLock<Chunk>>>) {
    if let Some(handle) = source.and_then(|source| source.upgrade()) {
        handle.write().mark_detached();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Block, BlockDef};
    use crate::config::WorldConfig;
    use glam::IVec3;
    use std::time::Duration;

    /// Page holding the chunk's location and the version it was built from.
    #[derive(Default)]
    struct Recorder {
        attached: Vec<Location>,
        detached: Vec<Location>,
        refuse: HashSet<Location>,
    }

    impl PageHandler<(Location, u64)> for Recorder {
        fn create_page(&mut self, chunk: &Chunk) -> Option<(Location, u64)> {
            if self.refuse.contains(&chunk.location()) {
                return None;
            }
            Some((chunk.location(), chunk.data_version()))
        }

        fn attach_page(&mut self, location: Location, _page: &(Location, u64)) {
            self.attached.push(location);
        }

        fn detach_page(&mut self, location: Location, _page: &(Location, u64)) {
            self.detached.push(location);
        }
    }

    fn setup(grid: [u32; 3]) -> (ChunkManager, Pager<(Location, u64), Recorder>) {
        let world = WorldConfig::single_threaded()
            .with_chunk_dims(2, 2, 2)
            .unwrap()
            .with_grid_size(grid[0], grid[1], grid[2])
            .unwrap()
            .with_cache_capacity(256)
            .unwrap();
        let mut manager = ChunkManager::new(world.clone()).unwrap();
        let pager = Pager::new(PagerConfig::from_world(&world), Recorder::default(), &mut manager);
        (manager, pager)
    }

    fn run(manager: &mut ChunkManager, pager: &mut Pager<(Location, u64), Recorder>, ticks: usize) {
        for _ in 0..ticks {
            manager.update(Duration::from_millis(16));
            let stats = pager.update(manager);
            assert!(stats.attached <= 1 && stats.detached <= 1 && stats.updated <= 1);
        }
    }

    #[test]
    fn first_update_requests_center() {
        let (mut manager, mut pager) = setup([1, 1, 1]);
        let stats = pager.update(&mut manager);

        assert!(stats.recentered);
        assert_eq!(stats.requested, 1);
        assert_eq!(pager.center(), Some(Location::ZERO));
        assert!(!pager.is_converged());
    }

    #[test]
    fn converges_on_grid() {
        let (mut manager, mut pager) = setup([3, 1, 3]);
        run(&mut manager, &mut pager, 200);

        assert!(pager.is_converged());
        assert_eq!(pager.attached().len(), 9);
        assert_eq!(manager.debug_info().attached_chunks, 9);
    }

    #[test]
    fn moving_focus_detaches_and_evicts() {
        let (mut manager, mut pager) = setup([3, 1, 1]);
        run(&mut manager, &mut pager, 100);
        assert!(pager.is_attached(Location::new(-1, 0, 0)));

        pager.set_focus(Vec3::new(2.5, 0.0, 0.0)); // center (1, 0, 0)
        run(&mut manager, &mut pager, 100);

        assert!(pager.is_converged());
        assert!(!pager.is_attached(Location::new(-1, 0, 0)));
        assert!(pager.is_attached(Location::new(2, 0, 0)));
        assert!(pager.handler().detached.contains(&Location::new(-1, 0, 0)));
        assert!(manager.get(Location::new(-1, 0, 0)).is_none());
    }

    #[test]
    fn refused_page_is_retried() {
        let (mut manager, mut pager) = setup([1, 1, 1]);
        pager.handler_mut().refuse.insert(Location::ZERO);
        run(&mut manager, &mut pager, 50);
        assert!(!pager.is_attached(Location::ZERO));
        assert_eq!(pager.pending_attach_len(), 1);

        pager.handler_mut().refuse.clear();
        run(&mut manager, &mut pager, 2);
        assert!(pager.is_attached(Location::ZERO));
    }

    #[test]
    fn chunk_update_refreshes_page() {
        let (mut manager, mut pager) = setup([1, 1, 1]);
        run(&mut manager, &mut pager, 50);
        let before = pager.page(Location::ZERO).unwrap().1;

        assert!(manager.set_block(IVec3::ZERO, Some(Block::new(BlockDef::solid("stone")))));
        run(&mut manager, &mut pager, 20);

        let after = pager.page(Location::ZERO).unwrap().1;
        assert!(after > before);
        assert!(pager.is_converged());
    }

    #[test]
    fn reloaded_chunk_takes_over_attachment() {
        let (mut manager, mut pager) = setup([1, 1, 1]);
        run(&mut manager, &mut pager, 50);
        let old = manager.get(Location::ZERO).unwrap();
        assert_eq!(old.read().attach_count(), 1);

        // Evicted without the pager detaching, then loaded again.
        assert!(manager.remove(Location::ZERO));
        manager.request(Location::ZERO);
        run(&mut manager, &mut pager, 20);

        let new = manager.get(Location::ZERO).unwrap();
        assert!(!Arc::ptr_eq(&old, &new));
        assert!(pager.is_attached(Location::ZERO));
        assert_eq!(new.read().attach_count(), 1);
        assert_eq!(manager.debug_info().attached_chunks, 1);

        pager.detach_all(&mut manager);
        assert_eq!(new.read().attach_count(), 0);
        assert!(manager.cache().is_empty());
    }

    #[test]
    fn detach_keeps_newer_chunk_cached() {
        let (mut manager, mut pager) = setup([1, 1, 1]);
        run(&mut manager, &mut pager, 50);

        // Replace the chunk and detach before the pager sees the update.
        manager.remove(Location::ZERO);
        manager.request(Location::ZERO);
        for _ in 0..10 {
            manager.update(Duration::from_millis(16));
        }
        let newer = manager.get(Location::ZERO).unwrap();
        pager.detach_all(&mut manager);

        assert_eq!(newer.read().attach_count(), 0);
        assert!(manager.get(Location::ZERO).is_some());
        assert!(!newer.read().is_cleared());
    }

    #[test]
    fn detach_all_releases_everything() {
        let (mut manager, mut pager) = setup([3, 1, 1]);
        run(&mut manager, &mut pager, 100);
        let detached_before = pager.handler().detached.len();

        pager.detach_all(&mut manager);

        assert!(pager.attached().is_empty());
        assert_eq!(pager.handler().detached.len() - detached_before, 3);
        assert_eq!(manager.debug_info().attached_chunks, 0);
        assert!(manager.cache().is_empty());
    }

    #[test]
    fn close_unregisters() {
        let (mut manager, mut pager) = setup([1, 1, 1]);
        run(&mut manager, &mut pager, 50);
        pager.close(&mut manager);

        // Notifications after close go nowhere.
        manager.request(Location::new(5, 5, 5));
        for _ in 0..20 {
            manager.update(Duration::from_millis(16));
        }
        assert!(manager.get(Location::new(5, 5, 5)).is_some());
    }
}
