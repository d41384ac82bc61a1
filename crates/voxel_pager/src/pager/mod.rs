//! Grid paging: attach and detach chunk representations around a focus.
//!
//! A [`Pager`] diffs the cube of cells around its focus against what it has
//! attached and converges one attach, one detach and one update per call.
//! Missing chunks are requested from the [`ChunkManager`](crate::ChunkManager);
//! the manager's notifications flow back through a channel-backed listener.

pub mod grid;
pub mod pager;

pub use grid::PagerConfig;
pub use pager::{PageHandler, Pager, PagerListener};
