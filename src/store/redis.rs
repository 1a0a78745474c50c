//! Redis-backed cache

use ::redis::aio::MultiplexedConnection;
use ::redis::{AsyncCommands, Client, RedisResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use super::{CacheBackend, CacheSession, bounded};
use crate::error::{Result, SyncError};

pub struct RedisBackend {
    client: Client,
    timeout: Duration,
}

impl RedisBackend {
    /// Validate the URL; no connection is made until [`CacheBackend::connect`]
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::open(url)
            .map_err(|e| SyncError::Config(format!("invalid Redis URL: {e}")))?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn connect(&self) -> Result<Box<dyn CacheSession>> {
        let conn = match tokio::time::timeout(
            self.timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => return Err(SyncError::StoreUnavailable(e.to_string())),
            Err(_) => {
                return Err(SyncError::StoreUnavailable(format!(
                    "connection timed out after {:?}",
                    self.timeout
                )));
            }
        };
        debug!("Connected to Redis");
        Ok(Box::new(RedisSession {
            conn,
            timeout: self.timeout,
        }))
    }
}

/// A multiplexed connection; concurrent callers each clone the handle and
/// their commands are pipelined over the same socket.
struct RedisSession {
    conn: MultiplexedConnection,
    timeout: Duration,
}

fn io<T>(op: &'static str, key: &str, result: RedisResult<T>) -> Result<T> {
    result.map_err(|e| SyncError::store_io(op, key, e))
}

#[async_trait]
impl CacheSession for RedisSession {
    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        bounded("GET", key, self.timeout, async move {
            io("GET", key, conn.get(key).await)
        })
        .await
    }

    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        bounded("SET", key, self.timeout, async move {
            io("SET", key, conn.set(key, value).await)
        })
        .await
    }

    async fn get_hash(&self, key: &str) -> Result<HashMap<String, String>> {
        let mut conn = self.conn.clone();
        bounded("HGETALL", key, self.timeout, async move {
            io("HGETALL", key, conn.hgetall(key).await)
        })
        .await
    }

    async fn set_hash(&self, key: &str, fields: &[(&str, &str)]) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        bounded("HSET", key, self.timeout, async move {
            io("HSET", key, conn.hset_multiple(key, fields).await)
        })
        .await
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        bounded("LRANGE", key, self.timeout, async move {
            io("LRANGE", key, conn.lrange(key, 0, -1).await)
        })
        .await
    }

    async fn push_front(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        bounded("LPUSH", key, self.timeout, async move {
            io("LPUSH", key, conn.lpush(key, value).await)
        })
        .await
    }

    async fn replace_list(&self, key: &str, items: &[String]) -> Result<()> {
        let mut conn = self.conn.clone();
        let mut pipe = ::redis::pipe();
        pipe.atomic().del(key).ignore();
        if !items.is_empty() {
            pipe.rpush(key, items).ignore();
        }
        bounded("MULTI", key, self.timeout, async move {
            let result: RedisResult<()> = pipe.query_async(&mut conn).await;
            io("MULTI", key, result)
        })
        .await
    }

    async fn delete_key(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        bounded("DEL", key, self.timeout, async move {
            io("DEL", key, conn.del(key).await)
        })
        .await
    }

    async fn add_to_set(&self, key: &str, member: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        bounded("SADD", key, self.timeout, async move {
            io("SADD", key, conn.sadd(key, member).await)
        })
        .await
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        bounded("SMEMBERS", key, self.timeout, async move {
            io("SMEMBERS", key, conn.smembers(key).await)
        })
        .await
    }

    async fn replace_set(&self, key: &str, members: &[String]) -> Result<()> {
        let mut conn = self.conn.clone();
        let mut pipe = ::redis::pipe();
        pipe.atomic().del(key).ignore();
        if !members.is_empty() {
            pipe.sadd(key, members).ignore();
        }
        bounded("MULTI", key, self.timeout, async move {
            let result: RedisResult<()> = pipe.query_async(&mut conn).await;
            io("MULTI", key, result)
        })
        .await
    }

    async fn disconnect(&self) -> Result<()> {
        // The socket closes once the last clone of the handle is dropped
        debug!("Released Redis session");
        Ok(())
    }
}
