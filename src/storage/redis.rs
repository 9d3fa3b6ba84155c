// src/storage/redis.rs

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client};

use crate::cancel::CancelToken;
use crate::config::RedisConfig;
use crate::error::{LimiterError, Result, StorageError};
use crate::storage::Storage;

/// Keys with no traffic outlive the window by this much before Redis evicts
/// them, covering clock skew between limiter processes.
const TTL_SAFETY_MARGIN: Duration = Duration::from_secs(60);

/// Storage backend over a shared Redis instance.
///
/// Each bucket is a sorted set scored by the admission instant in
/// nanoseconds since the Unix epoch. Trim, count and expiry travel in one
/// pipeline; the conditional add is a follow-up command. Between the count
/// and the add a concurrent caller may take the last slot, so this backend
/// can over-admit by at most the number of racing callers. The next window
/// turnover restores the bound.
pub struct RedisStorage {
    connection: Arc<tokio::sync::Mutex<ConnectionManager>>,
    config: RedisConfig,
}

impl fmt::Debug for RedisStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStorage")
            .field("addr", &self.config.addr)
            .finish()
    }
}

impl Clone for RedisStorage {
    fn clone(&self) -> Self {
        Self {
            connection: Arc::clone(&self.connection),
            config: self.config.clone(),
        }
    }
}

fn epoch_nanos(t: SystemTime) -> Result<u64> {
    let nanos = t
        .duration_since(UNIX_EPOCH)
        .map_err(|e| LimiterError::Storage(StorageError::Clock(e.to_string())))?
        .as_nanos();
    Ok(nanos as u64)
}

impl RedisStorage {
    /// Connects to Redis with the configured timeout. Opening the client is
    /// lazy; establishing the managed connection is what can block.
    pub async fn connect(config: RedisConfig) -> Result<Self> {
        let url = format!("redis://{}", config.addr);
        let client = Client::open(url.as_str())
            .map_err(|e| LimiterError::Storage(StorageError::Connection(e.to_string())))?;

        let manager = match tokio::time::timeout(
            config.connection_timeout,
            ConnectionManager::new(client),
        )
        .await
        {
            Ok(result) => result
                .map_err(|e| LimiterError::Storage(StorageError::Connection(e.to_string())))?,
            Err(_) => {
                return Err(LimiterError::Storage(StorageError::Connection(format!(
                    "connection to redis at {} timed out after {:?}",
                    config.addr, config.connection_timeout
                ))));
            }
        };

        Ok(Self {
            connection: Arc::new(tokio::sync::Mutex::new(manager)),
            config,
        })
    }

    /// Round-trips a PING, bounded by the connection timeout.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.lock().await;

        let reply: String = match tokio::time::timeout(
            self.config.connection_timeout,
            redis::cmd("PING").query_async(&mut *conn),
        )
        .await
        {
            Ok(result) => result.map_err(LimiterError::from)?,
            Err(_) => {
                return Err(LimiterError::Storage(StorageError::Command(format!(
                    "redis PING timed out after {:?}",
                    self.config.connection_timeout
                ))));
            }
        };

        if reply == "PONG" {
            Ok(())
        } else {
            Err(LimiterError::Storage(StorageError::Command(format!(
                "unexpected PING reply: {}",
                reply
            ))))
        }
    }
}

#[async_trait]
impl Storage for RedisStorage {
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

        let start_ns = epoch_nanos(window_start)?;
        let now_ns = epoch_nanos(timestamp)?;
        let ttl = timestamp
            .duration_since(window_start)
            .unwrap_or_default()
            + TTL_SAFETY_MARGIN;

        let mut conn = self.connection.lock().await;

        let (count,): (i64,) = redis::pipe()
            .cmd("ZREMRANGEBYSCORE")
            .arg(key)
            .arg(0)
            .arg(format!("({}", start_ns))
            .ignore()
            .cmd("ZCOUNT")
            .arg(key)
            .arg(start_ns)
            .arg("+inf")
            .cmd("EXPIRE")
            .arg(key)
            .arg(ttl.as_secs())
            .ignore()
            .query_async(&mut *conn)
            .await
            .map_err(LimiterError::from)?;

        if count as usize >= limit {
            return Ok(false);
        }

        if cancel.is_cancelled() {
            return Err(LimiterError::Cancelled);
        }

        let added: i64 = redis::cmd("ZADD")
            .arg(key)
            .arg(now_ns)
            .arg(now_ns)
            .query_async(&mut *conn)
            .await
            .map_err(LimiterError::from)?;

        Ok(added > 0)
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

        let start_ns = epoch_nanos(window_start)?;
        let mut conn = self.connection.lock().await;

        let (count,): (i64,) = redis::pipe()
            .cmd("ZREMRANGEBYSCORE")
            .arg(key)
            .arg(0)
            .arg(format!("({}", start_ns))
            .ignore()
            .cmd("ZCOUNT")
            .arg(key)
            .arg(start_ns)
            .arg("+inf")
            .query_async(&mut *conn)
            .await
            .map_err(LimiterError::from)?;

        Ok(count.max(0) as usize)
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

        let start_ns = epoch_nanos(window_start)?;
        let mut conn = self.connection.lock().await;

        let (oldest,): (Vec<u64>,) = redis::pipe()
            .cmd("ZREMRANGEBYSCORE")
            .arg(key)
            .arg(0)
            .arg(format!("({}", start_ns))
            .ignore()
            .cmd("ZRANGEBYSCORE")
            .arg(key)
            .arg(start_ns)
            .arg("+inf")
            .arg("LIMIT")
            .arg(0)
            .arg(1)
            .query_async(&mut *conn)
            .await
            .map_err(LimiterError::from)?;

        Ok(oldest
            .into_iter()
            .next()
            .map(|ns| UNIX_EPOCH + Duration::from_nanos(ns)))
    }

    async fn reset_key(&self, cancel: &CancelToken, key: &str) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(LimiterError::Cancelled);
        }

        let mut conn = self.connection.lock().await;
        let _: i64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut *conn)
            .await
            .map_err(LimiterError::from)?;

        Ok(())
    }
}
