// src/storage/memory.rs

// In-process storage (for single-instance deployments and tests)
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use async_trait::async_trait;

use crate::cancel::CancelToken;
use crate::error::{LimiterError, Result};
use crate::storage::Storage;

/// In-memory storage backend implementation.
///
/// One exclusive lock guards the whole mapping. Contention stays cheap
/// because each bucket is bounded by the configured limit and both trim and
/// insert are binary searches over it.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    data: Arc<Mutex<HashMap<String, Vec<SystemTime>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

// First index whose timestamp is inside the window
fn first_live(timestamps: &[SystemTime], window_start: SystemTime) -> usize {
    timestamps.partition_point(|t| *t < window_start)
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn check_and_add(
        &self,
        cancel: &CancelToken,
        key: &str,
        window_start: SystemTime,
        timestamp: SystemTime,
        limit: usize,
    ) -> Result<bool> {
        if cancel.is_cancelled() {
            return Err(LimiterError::Cancelled);
        }

        let mut data = self.data.lock().unwrap();
        let bucket = data.entry(key.to_string()).or_default();

        let stale = first_live(bucket, window_start);
        bucket.drain(..stale);

        if bucket.len() >= limit {
            return Ok(false);
        }

        // Insert at the ordered position; timestamps arrive nearly sorted so
        // this is almost always a push.
        let pos = bucket.partition_point(|t| *t < timestamp);
        bucket.insert(pos, timestamp);

        Ok(true)
    }

    async fn count(
        &self,
        cancel: &CancelToken,
        key: &str,
        window_start: SystemTime,
    ) -> Result<usize> {
        if cancel.is_cancelled() {
            return Err(LimiterError::Cancelled);
        }

        let mut data = self.data.lock().unwrap();
        let Some(bucket) = data.get_mut(key) else {
            return Ok(0);
        };

        let stale = first_live(bucket, window_start);
        bucket.drain(..stale);

        Ok(bucket.len())
    }

    async fn oldest_timestamp(
        &self,
        cancel: &CancelToken,
        key: &str,
        window_start: SystemTime,
    ) -> Result<Option<SystemTime>> {
        if cancel.is_cancelled() {
            return Err(LimiterError::Cancelled);
        }

        let mut data = self.data.lock().unwrap();
        let Some(bucket) = data.get_mut(key) else {
            return Ok(None);
        };

        let stale = first_live(bucket, window_start);
        bucket.drain(..stale);

        Ok(bucket.first().copied())
    }

    async fn reset_key(&self, cancel: &CancelToken, key: &str) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(LimiterError::Cancelled);
        }

        let mut data = self.data.lock().unwrap();
        data.remove(key);
        Ok(())
    }
}
