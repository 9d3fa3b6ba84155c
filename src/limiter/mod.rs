// src/limiter/mod.rs

#[cfg(test)]
mod tests;

use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::storage::Storage;

/// The `(window, limit)` pair governing admission. Read and replaced only as
/// a unit, so no caller ever sees one half of an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    pub window: Duration,
    pub limit: usize,
}

/// Sliding-window admission policy over a [`Storage`] backend.
///
/// Each call reads the wall clock once, derives the window start from the
/// current configuration snapshot, and delegates the atomic
/// trim-count-insert to the backend. There is no clock coordination across
/// keys.
#[derive(Debug)]
pub struct SlidingWindow<S> {
    storage: Arc<S>,
    config: RwLock<WindowConfig>,
}

impl<S: Storage> SlidingWindow<S> {
    pub fn new(storage: Arc<S>, window: Duration, limit: usize) -> Self {
        Self {
            storage,
            config: RwLock::new(WindowConfig { window, limit }),
        }
    }

    /// Current `(window, limit)` pair.
    pub fn config(&self) -> WindowConfig {
        *self.config.read().unwrap()
    }

    fn window_start(now: SystemTime, window: Duration) -> SystemTime {
        now.checked_sub(window).unwrap_or(UNIX_EPOCH)
    }

    /// Admission decision for `key`: trims the bucket, counts the survivors
    /// and records this attempt if the count is below the limit.
    pub async fn allow(&self, cancel: &CancelToken, key: &str) -> Result<bool> {
        let cfg = self.config();
        let now = SystemTime::now();

        self.storage
            .check_and_add(
                cancel,
                key,
                Self::window_start(now, cfg.window),
                now,
                cfg.limit,
            )
            .await
    }

    /// Number of admissions currently counted against `key`.
    pub async fn request_count(&self, cancel: &CancelToken, key: &str) -> Result<usize> {
        let cfg = self.config();
        let now = SystemTime::now();

        self.storage
            .count(cancel, key, Self::window_start(now, cfg.window))
            .await
    }

    /// How long until the oldest admission ages out and a slot frees up.
    /// Zero when the bucket is empty or a concurrent trim already freed it.
    pub async fn retry_after(&self, cancel: &CancelToken, key: &str) -> Result<Duration> {
        let cfg = self.config();
        let now = SystemTime::now();

        let oldest = self
            .storage
            .oldest_timestamp(cancel, key, Self::window_start(now, cfg.window))
            .await?;

        let Some(oldest) = oldest else {
            return Ok(Duration::ZERO);
        };

        Ok((oldest + cfg.window)
            .duration_since(now)
            .unwrap_or(Duration::ZERO))
    }

    /// Replace the window and limit together. Takes effect for every call
    /// that snapshots the configuration afterwards; in-flight calls finish
    /// under the pair they started with.
    pub fn update_config(&self, window: Duration, limit: usize) {
        let mut cfg = self.config.write().unwrap();
        *cfg = WindowConfig { window, limit };
    }

    /// Purge `key`'s bucket.
    pub async fn reset(&self, cancel: &CancelToken, key: &str) -> Result<()> {
        self.storage.reset_key(cancel, key).await
    }
}
