//! Non-owning neighbor lookup handed to chunks.

use super::chunk::ChunkHandle;
use super::location::Location;

/// Read-only lookup of chunks by location.
///
/// Chunks hold this as a `Weak` reference and use it only to read blocks
/// across their own boundary. It never keeps a chunk or its owner alive.
pub trait ChunkResolver: Send + Sync {
    fn get(&self, location: Location) -> Option<ChunkHandle>;
}

impl<F> ChunkResolver for F
where
    F: Fn(Location) -> Option<ChunkHandle> + Send + Sync,
{
    fn get(&self, location: Location) -> Option<ChunkHandle> {
        self(location)
    }
}
