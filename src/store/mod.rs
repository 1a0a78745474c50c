//! Key-value cache adapters
//!
//! Callers open one [`CacheSession`] per logical batch (a full sync, or one
//! read call), share it between the concurrent futures of that batch, and
//! hand it back through [`release`] whatever the outcome.

pub mod keys;
pub mod memory;
pub mod redis;

use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::{Result, SyncError};

pub use self::memory::MemoryBackend;
pub use self::redis::RedisBackend;

/// Opens cache sessions
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fails with `StoreUnavailable` when no session can be established
    async fn connect(&self) -> Result<Box<dyn CacheSession>>;
}

/// Primitive cache operations; every failure is `StoreIo` or `Timeout`
#[async_trait]
pub trait CacheSession: Send + Sync {
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Empty map when the key does not exist
    async fn get_hash(&self, key: &str) -> Result<HashMap<String, String>>;

    /// Overwrites the given fields, leaving others untouched
    async fn set_hash(&self, key: &str, fields: &[(&str, &str)]) -> Result<()>;

    /// The whole list, head first
    async fn list_range(&self, key: &str) -> Result<Vec<String>>;

    async fn push_front(&self, key: &str, value: &str) -> Result<()>;

    /// Atomically replace the list at `key` so it reads back as `items`, head first.
    /// An empty `items` removes the key.
    async fn replace_list(&self, key: &str, items: &[String]) -> Result<()>;

    async fn delete_key(&self, key: &str) -> Result<()>;

    async fn add_to_set(&self, key: &str, member: &str) -> Result<()>;

    async fn set_members(&self, key: &str) -> Result<Vec<String>>;

    /// Atomically replace the set at `key` with exactly `members`
    async fn replace_set(&self, key: &str, members: &[String]) -> Result<()>;

    /// End the session; the session must not be used afterwards
    async fn disconnect(&self) -> Result<()>;
}

/// Disconnect a session, logging instead of failing.
///
/// Everything written through the session has already been acknowledged, so
/// a failed disconnect must not turn a finished batch into an error.
pub async fn release(session: Box<dyn CacheSession>) {
    if let Err(err) = session.disconnect().await {
        warn!(error = %err, "Failed to disconnect from cache store");
    }
}

/// Run a cache call with an upper bound on its duration
pub(crate) async fn bounded<T>(
    op: &'static str,
    key: &str,
    limit: Duration,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(SyncError::Timeout {
            operation: format!("cache {op} on '{key}'"),
            after: limit,
        }),
    }
}
