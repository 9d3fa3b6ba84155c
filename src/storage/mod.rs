// src/storage/mod.rs

pub mod memory;
pub mod redis;

#[cfg(test)]
mod tests;

pub use memory::MemoryStorage;
pub use redis::RedisStorage;

use std::fmt::Debug;
use std::time::SystemTime;

use async_trait::async_trait;

use crate::cancel::CancelToken;
use crate::error::Result;

/// Per-key timestamp-set operations every limiter backend must implement.
///
/// A key maps to a sorted multiset of admission timestamps. Entries older
/// than the caller-supplied window start are dropped by every operation, so
/// a bucket never holds anything outside the current window once a call
/// completes. An empty bucket is indistinguishable from an absent key.
#[async_trait]
pub trait Storage: Send + Sync + Debug {
    /// Atomically trim entries older than `window_start`, then insert
    /// `timestamp` if the surviving count is below `limit`. Returns whether
    /// the insert happened. Two concurrent calls on the same key cannot both
    /// succeed when only one slot remains.
    async fn check_and_add(
        &self,
        cancel: &CancelToken,
        key: &str,
        window_start: SystemTime,
        timestamp: SystemTime,
        limit: usize,
    ) -> Result<bool>;

    /// Number of entries still inside the window. Trims as a side effect.
    async fn count(
        &self,
        cancel: &CancelToken,
        key: &str,
        window_start: SystemTime,
    ) -> Result<usize>;

    /// Oldest surviving entry, or `None` for an empty bucket. Trims as a
    /// side effect.
    async fn oldest_timestamp(
        &self,
        cancel: &CancelToken,
        key: &str,
        window_start: SystemTime,
    ) -> Result<Option<SystemTime>>;

    /// Purge everything stored for `key`.
    async fn reset_key(&self, cancel: &CancelToken, key: &str) -> Result<()>;
}
