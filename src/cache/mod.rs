//! Offline asset cache.
//!
//! A cache-first policy over generation-named buckets:
//! - install pre-caches a manifest into the current generation, all or nothing
//! - activate deletes every other generation and claims open clients
//! - GET requests are answered from cache when possible, while the network is
//!   always consulted and status-200 responses refresh the cache
//! - non-GET requests are never intercepted

mod host;
mod network;
mod policy;
mod storage;
mod traits;

pub use host::WorkerHost;
pub use network::HttpNetwork;
pub use policy::CacheFirstPolicy;
pub use storage::{CacheStorage, MemoryStorage, SqliteStorage};
pub use traits::{Method, Request};
