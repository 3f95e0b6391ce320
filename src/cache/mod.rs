//! Rendered artifact caching.
//!
//! [`ArtifactCache`] sits in front of a pluggable [`ArtifactStore`]
//! ([`MemoryArtifactStore`] or [`DiskArtifactStore`]) and guarantees that
//! concurrent requests for the same [`RenderKey`] share a single render.

mod artifact;
mod disk;
mod key;
mod memory;
mod store;

pub use artifact::{ArtifactCache, CacheLookup, LookupOutcome, RenderOutput};
pub use disk::DiskArtifactStore;
pub use key::{CacheEntry, RenderKey};
pub use memory::{MemoryArtifactStore, DEFAULT_MEMORY_CAPACITY};
pub use store::ArtifactStore;
