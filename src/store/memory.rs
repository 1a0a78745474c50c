//! In-process cache with Redis-like semantics
//!
//! Used for tests and dry runs. All sessions opened from one backend share
//! the same data, like clients of one Redis server.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{CacheBackend, CacheSession};
use crate::error::{Result, SyncError};

/// A stored value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    String(String),
    Hash(BTreeMap<String, String>),
    List(VecDeque<String>),
    /// Sorted so that member order is deterministic
    Set(BTreeSet<String>),
}

#[derive(Default)]
struct Shared {
    entries: Mutex<BTreeMap<String, Entry>>,
    unavailable: AtomicBool,
    fail_disconnect: AtomicBool,
    open_sessions: AtomicUsize,
    /// Writes to keys starting with this prefix fail
    failing_prefix: Mutex<Option<String>>,
}

#[derive(Clone, Default)]
pub struct MemoryBackend {
    shared: Arc<Shared>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `connect` calls fail with `StoreUnavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.shared.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make `disconnect` fail, as when the server drops the socket first
    pub fn set_fail_disconnect(&self, fail: bool) {
        self.shared.fail_disconnect.store(fail, Ordering::SeqCst);
    }

    /// Make writes to keys starting with `prefix` fail with `StoreIo`; `None` clears it
    pub fn fail_writes_to(&self, prefix: Option<&str>) {
        *self
            .shared
            .failing_prefix
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = prefix.map(str::to_string);
    }

    /// Sessions connected and not yet disconnected
    pub fn open_sessions(&self) -> usize {
        self.shared.open_sessions.load(Ordering::SeqCst)
    }

    /// Copy of every key and value
    pub fn snapshot(&self) -> BTreeMap<String, Entry> {
        lock(&self.shared).clone()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        lock(&self.shared).contains_key(key)
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn connect(&self) -> Result<Box<dyn CacheSession>> {
        if self.shared.unavailable.load(Ordering::SeqCst) {
            return Err(SyncError::StoreUnavailable(
                "memory store is marked unavailable".to_string(),
            ));
        }
        self.shared.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession {
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct MemorySession {
    shared: Arc<Shared>,
}

fn lock(shared: &Shared) -> MutexGuard<'_, BTreeMap<String, Entry>> {
    // A panic while holding the lock cannot leave an entry half-written
    shared
        .entries
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn wrong_type(op: &'static str, key: &str) -> SyncError {
    SyncError::store_io(
        op,
        key,
        "WRONGTYPE Operation against a key holding the wrong kind of value",
    )
}

impl MemorySession {
    fn check_write(&self, op: &'static str, key: &str) -> Result<()> {
        let failing = self
            .shared
            .failing_prefix
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match failing.as_deref() {
            Some(prefix) if key.starts_with(prefix) => {
                Err(SyncError::store_io(op, key, "write refused"))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl CacheSession for MemorySession {
    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        match lock(&self.shared).get(key) {
            None => Ok(None),
            Some(Entry::String(value)) => Ok(Some(value.clone())),
            Some(_) => Err(wrong_type("GET", key)),
        }
    }

    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.check_write("SET", key)?;
        lock(&self.shared).insert(key.to_string(), Entry::String(value.to_string()));
        Ok(())
    }

    async fn get_hash(&self, key: &str) -> Result<HashMap<String, String>> {
        match lock(&self.shared).get(key) {
            None => Ok(HashMap::new()),
            Some(Entry::Hash(fields)) => Ok(fields.clone().into_iter().collect()),
            Some(_) => Err(wrong_type("HGETALL", key)),
        }
    }

    async fn set_hash(&self, key: &str, fields: &[(&str, &str)]) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        self.check_write("HSET", key)?;
        let mut entries = lock(&self.shared);
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Hash(BTreeMap::new()));
        let Entry::Hash(hash) = entry else {
            return Err(wrong_type("HSET", key));
        };
        for (field, value) in fields {
            hash.insert(field.to_string(), value.to_string());
        }
        Ok(())
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>> {
        match lock(&self.shared).get(key) {
            None => Ok(Vec::new()),
            Some(Entry::List(items)) => Ok(items.iter().cloned().collect()),
            Some(_) => Err(wrong_type("LRANGE", key)),
        }
    }

    async fn push_front(&self, key: &str, value: &str) -> Result<()> {
        self.check_write("LPUSH", key)?;
        let mut entries = lock(&self.shared);
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::List(VecDeque::new()));
        let Entry::List(items) = entry else {
            return Err(wrong_type("LPUSH", key));
        };
        items.push_front(value.to_string());
        Ok(())
    }

    async fn replace_list(&self, key: &str, items: &[String]) -> Result<()> {
        self.check_write("MULTI", key)?;
        let mut entries = lock(&self.shared);
        if items.is_empty() {
            entries.remove(key);
        } else {
            entries.insert(key.to_string(), Entry::List(items.iter().cloned().collect()));
        }
        Ok(())
    }

    async fn delete_key(&self, key: &str) -> Result<()> {
        self.check_write("DEL", key)?;
        lock(&self.shared).remove(key);
        Ok(())
    }

    async fn add_to_set(&self, key: &str, member: &str) -> Result<()> {
        self.check_write("SADD", key)?;
        let mut entries = lock(&self.shared);
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Set(BTreeSet::new()));
        let Entry::Set(members) = entry else {
            return Err(wrong_type("SADD", key));
        };
        members.insert(member.to_string());
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        match lock(&self.shared).get(key) {
            None => Ok(Vec::new()),
            Some(Entry::Set(members)) => Ok(members.iter().cloned().collect()),
            Some(_) => Err(wrong_type("SMEMBERS", key)),
        }
    }

    async fn replace_set(&self, key: &str, members: &[String]) -> Result<()> {
        self.check_write("MULTI", key)?;
        let mut entries = lock(&self.shared);
        if members.is_empty() {
            entries.remove(key);
        } else {
            entries.insert(
                key.to_string(),
                Entry::Set(members.iter().cloned().collect()),
            );
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.shared.open_sessions.fetch_sub(1, Ordering::SeqCst);
        if self.shared.fail_disconnect.load(Ordering::SeqCst) {
            return Err(SyncError::store_io("QUIT", "", "connection reset by peer"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_push_front_reverses_order() {
        let backend = MemoryBackend::new();
        let session = backend.connect().await.unwrap();
        for id in ["a", "b", "c"] {
            session.push_front("list", id).await.unwrap();
        }
        assert_eq!(session.list_range("list").await.unwrap(), vec!["c", "b", "a"]);
        session.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_hash_fields_merge() {
        let backend = MemoryBackend::new();
        let session = backend.connect().await.unwrap();
        session.set_hash("h", &[("a", "1"), ("b", "2")]).await.unwrap();
        session.set_hash("h", &[("b", "3")]).await.unwrap();

        let hash = session.get_hash("h").await.unwrap();
        assert_eq!(hash.get("a").map(String::as_str), Some("1"));
        assert_eq!(hash.get("b").map(String::as_str), Some("3"));
        assert!(session.get_hash("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_type_is_io_error() {
        let backend = MemoryBackend::new();
        let session = backend.connect().await.unwrap();
        session.set_string("k", "v").await.unwrap();
        let err = session.push_front("k", "x").await.unwrap_err();
        assert!(matches!(err, SyncError::StoreIo { op: "LPUSH", .. }));
    }

    #[tokio::test]
    async fn test_replace_set() {
        let backend = MemoryBackend::new();
        let session = backend.connect().await.unwrap();
        session.add_to_set("s", "old").await.unwrap();
        session.add_to_set("s", "kept").await.unwrap();

        session
            .replace_set("s", &["kept".to_string(), "new".to_string()])
            .await
            .unwrap();
        assert_eq!(session.set_members("s").await.unwrap(), vec!["kept", "new"]);

        session.replace_set("s", &[]).await.unwrap();
        assert!(!backend.contains_key("s"));
    }

    #[tokio::test]
    async fn test_replace_list_swaps_whole_list() {
        let backend = MemoryBackend::new();
        let session = backend.connect().await.unwrap();
        session.push_front("list", "stale").await.unwrap();

        session
            .replace_list("list", &["b".to_string(), "a".to_string()])
            .await
            .unwrap();
        assert_eq!(session.list_range("list").await.unwrap(), vec!["b", "a"]);

        session.replace_list("list", &[]).await.unwrap();
        assert!(!backend.contains_key("list"));
    }

    #[tokio::test]
    async fn test_failing_prefix_refuses_writes_only() {
        let backend = MemoryBackend::new();
        let session = backend.connect().await.unwrap();
        session.set_string("todo-1", "x").await.unwrap();
        backend.fail_writes_to(Some("todo-"));

        let err = session.set_hash("todo-2", &[("text", "y")]).await.unwrap_err();
        assert!(matches!(err, SyncError::StoreIo { op: "HSET", .. }));
        assert!(session.add_to_set("todo-3", "z").await.is_err());
        assert!(session.delete_key("todo-1").await.is_err());
        assert_eq!(session.get_string("todo-1").await.unwrap().as_deref(), Some("x"));
        session.set_string("section-1", "ok").await.unwrap();

        backend.fail_writes_to(None);
        session.delete_key("todo-1").await.unwrap();
        assert!(!backend.contains_key("todo-1"));
    }

    #[tokio::test]
    async fn test_unavailable_and_session_accounting() {
        let backend = MemoryBackend::new();
        backend.set_unavailable(true);
        assert!(matches!(
            backend.connect().await,
            Err(SyncError::StoreUnavailable(_))
        ));

        backend.set_unavailable(false);
        let session = backend.connect().await.unwrap();
        assert_eq!(backend.open_sessions(), 1);
        session.disconnect().await.unwrap();
        assert_eq!(backend.open_sessions(), 0);
    }
}
