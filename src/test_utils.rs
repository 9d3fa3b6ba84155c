// src/test_utils.rs

use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use async_trait::async_trait;

use crate::cancel::CancelToken;
use crate::error::{LimiterError, Result, StorageError};
use crate::storage::Storage;

/// Storage double whose every operation fails with a transport error. Used
/// to exercise the limiter's error paths.
#[derive(Debug, Default)]
pub struct FailingStorage;

impl FailingStorage {
    fn error() -> LimiterError {
        LimiterError::Storage(StorageError::Connection("storage offline".to_string()))
    }
}

#[async_trait]
impl Storage for FailingStorage {
    async fn check_and_add(
        &self,
        _cancel: &CancelToken,
        _key: &str,
        _window_start: SystemTime,
        _timestamp: SystemTime,
        _limit: usize,
    ) -> Result<bool> {
        Err(Self::error())
    }

    async fn count(
        &self,
        _cancel: &CancelToken,
        _key: &str,
        _window_start: SystemTime,
    ) -> Result<usize> {
        Err(Self::error())
    }

    async fn oldest_timestamp(
        &self,
        _cancel: &CancelToken,
        _key: &str,
        _window_start: SystemTime,
    ) -> Result<Option<SystemTime>> {
        Err(Self::error())
    }

    async fn reset_key(&self, _cancel: &CancelToken, _key: &str) -> Result<()> {
        Err(Self::error())
    }
}

/// Arguments captured from one `check_and_add` call.
#[derive(Debug, Clone)]
pub struct RecordedCheck {
    pub key: String,
    pub window_start: SystemTime,
    pub timestamp: SystemTime,
    pub limit: usize,
}

/// Storage double that records every `check_and_add` and admits everything.
/// Lets tests assert the window math the limiter hands down.
#[derive(Debug, Default)]
pub struct RecordingStorage {
    pub checks: Arc<Mutex<Vec<RecordedCheck>>>,
}

impl RecordingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<RecordedCheck> {
        self.checks.lock().unwrap().clone()
    }
}

#[async_trait]
impl Storage for RecordingStorage {
    async fn check_and_add(
        &self,
        _cancel: &CancelToken,
        key: &str,
        window_start: SystemTime,
        timestamp: SystemTime,
        limit: usize,
    ) -> Result<bool> {
        self.checks.lock().unwrap().push(RecordedCheck {
            key: key.to_string(),
            window_start,
            timestamp,
            limit,
        });
        Ok(true)
    }

    async fn count(
        &self,
        _cancel: &CancelToken,
        _key: &str,
        _window_start: SystemTime,
    ) -> Result<usize> {
        Ok(0)
    }

    async fn oldest_timestamp(
        &self,
        _cancel: &CancelToken,
        _key: &str,
        _window_start: SystemTime,
    ) -> Result<Option<SystemTime>> {
        Ok(None)
    }

    async fn reset_key(&self, _cancel: &CancelToken, _key: &str) -> Result<()> {
        Ok(())
    }
}
