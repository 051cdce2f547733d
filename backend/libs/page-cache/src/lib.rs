//! Rendered page cache
//!
//! Stores whole rendered pages under versioned string keys for a fixed TTL.
//! Entries are never invalidated on writes elsewhere; staleness up to the TTL
//! is accepted by callers.
//!
//! Backends:
//! - `RedisPageCache`: shared by every worker and process (`SET EX`, `SCAN` clearing)
//! - `MemoryPageCache`: bounded process-local map with per-entry deadlines

mod error;
mod keys;
mod memory;
mod metrics;
mod redis_cache;

pub use error::{CacheError, CacheResult};
pub use keys::{PageKey, CACHE_VERSION};
pub use memory::{MemoryPageCache, DEFAULT_MAX_ENTRIES};
pub use metrics::CacheMetrics;
pub use redis_cache::RedisPageCache;

use std::time::Duration;

/// Key-value store for rendered pages with TTL semantics.
///
/// Last write wins; there is no locking beyond what the backend provides.
#[async_trait::async_trait]
pub trait PageCache: Send + Sync {
    /// Fetch a stored rendering, `None` when absent or expired
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store a rendering for `ttl`
    async fn set(&self, key: &str, page: &str, ttl: Duration) -> CacheResult<()>;

    /// Drop every entry whose key starts with `prefix`, returning how many were removed
    async fn clear_prefix(&self, prefix: &str) -> CacheResult<usize>;
}
