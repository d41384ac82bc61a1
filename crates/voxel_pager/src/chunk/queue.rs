//! FIFO work queue with at-most-once membership.

use std::collections::{HashMap, VecDeque};

use super::location::Location;

/// FIFO queue of locations in which each location appears at most once.
///
/// Pushing a location that is already queued is a no-op, so repeated
/// requests collapse into a single unit of work. Removal is O(1) and lazy:
/// the backing entry stays in the deque until it reaches the front, where a
/// stamp mismatch identifies it as stale.
#[derive(Debug, Default)]
pub struct UniqueQueue {
    order: VecDeque<(Location, u64)>,
    /// Current stamp of each queued location.
    members: HashMap<Location, u64>,
    next_stamp: u64,
}

impl UniqueQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a location to the back of the queue.
    ///
    /// Returns true if the location was added, false if already present.
    pub fn push(&mut self, location: Location) -> bool {
        if self.members.contains_key(&location) {
            return false;
        }
        self.next_stamp += 1;
        self.members.insert(location, self.next_stamp);
        self.order.push_back((location, self.next_stamp));
        true
    }

    /// Pop the oldest queued location.
    pub fn pop(&mut self) -> Option<Location> {
        while let Some((location, stamp)) = self.order.pop_front() {
            if self.members.get(&location) == Some(&stamp) {
                self.members.remove(&location);
                return Some(location);
            }
        }
        None
    }

    /// Remove a specific location from the queue.
    ///
    /// Returns true if the location was queued.
    pub fn remove(&mut self, location: Location) -> bool {
        let removed = self.members.remove(&location).is_some();
        if self.members.is_empty() {
            self.order.clear();
        }
        removed
    }

    pub fn contains(&self, location: Location) -> bool {
        self.members.contains_key(&location)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }

    /// Keep only the locations for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(Location) -> bool) {
        self.members.retain(|&location, _| keep(location));
        let members = &self.members;
        self.order
            .retain(|(location, stamp)| members.get(location) == Some(stamp));
    }

    /// Iterate over queued locations in FIFO order.
    pub fn iter(&self) -> impl Iterator<Item = Location> + '_ {
        self.order
            .iter()
            .filter(|(location, stamp)| self.members.get(location) == Some(stamp))
            .map(|&(location, _)| location)
    }
}
