//! LRU access tracking for cache eviction.
//!
//! Uses a monotonic counter to stamp accesses. Every touch appends to an
//! access log; entries superseded by a later touch become stale and are
//! skipped when popping, or dropped in bulk by [`LruTracker::compact`].

use std::collections::{HashMap, VecDeque};

use super::location::Location;

/// Tracks access order using a monotonic counter and an append-only log.
///
/// `touch` is O(1). Finding the least recently used location is amortized
/// O(1), since each stale log entry is discarded at most once.
#[derive(Debug, Default)]
pub struct LruTracker {
    access_times: HashMap<Location, u64>,
    log: VecDeque<(Location, u64)>,
    current_time: u64,
}

impl LruTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an access to a location.
    pub fn touch(&mut self, location: Location) {
        self.current_time += 1;
        self.access_times.insert(location, self.current_time);
        self.log.push_back((location, self.current_time));
    }

    /// Remove and return the least recently used location.
    pub fn pop_oldest(&mut self) -> Option<Location> {
        self.skip_stale();
        let (location, _) = self.log.pop_front()?;
        self.access_times.remove(&location);
        Some(location)
    }

    /// Stop tracking a location. Its log entries become stale.
    pub fn remove(&mut self, location: Location) {
        self.access_times.remove(&location);
    }

    /// Drop every stale log entry.
    ///
    /// Returns the number of entries dropped.
    pub fn compact(&mut self) -> usize {
        let before = self.log.len();
        let access_times = &self.access_times;
        self.log
            .retain(|(location, time)| access_times.get(location) == Some(time));
        before - self.log.len()
    }

    pub fn len(&self) -> usize {
        self.access_times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.access_times.is_empty()
    }

    pub fn clear(&mut self) {
        self.access_times.clear();
        self.log.clear();
        self.current_time = 0;
    }

    fn skip_stale(&mut self) {
        while let Some(&(location, time)) = self.log.front() {
            if self.access_times.get(&location) == Some(&time) {
                break;
            }
            self.log.pop_front();
        }
    }
}
