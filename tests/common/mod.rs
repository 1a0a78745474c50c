//! Common test utilities for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use dewey_sync::notion::RawBlock;
use dewey_sync::error::Result as SyncResult;
use dewey_sync::{
    CacheBackend, CacheSession, DeweyServerHandler, DocumentSource, MemoryBackend, Page, Section,
    SyncError, SyncOptions, SyncOrchestrator,
};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted stand-in for the Notion API
#[derive(Default)]
pub struct FakeSource {
    pages: Mutex<Vec<Page>>,
    blocks: Mutex<HashMap<String, Vec<Value>>>,
    failing: Mutex<HashSet<String>>,
    stalled: Mutex<HashSet<String>>,
    search_rate_limited: AtomicBool,
}

impl FakeSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_page(&self, id: &str, title: &str, blocks: Vec<Value>) {
        self.pages.lock().unwrap().push(Page {
            id: id.to_string(),
            title: title.to_string(),
        });
        self.set_blocks(id, blocks);
    }

    pub fn set_blocks(&self, page_id: &str, blocks: Vec<Value>) {
        self.blocks
            .lock()
            .unwrap()
            .insert(page_id.to_string(), blocks);
    }

    pub fn remove_page(&self, page_id: &str) {
        self.pages.lock().unwrap().retain(|p| p.id != page_id);
        self.blocks.lock().unwrap().remove(page_id);
    }

    /// Block listing for this page answers with HTTP 502
    pub fn fail_page(&self, page_id: &str, fail: bool) {
        let mut failing = self.failing.lock().unwrap();
        if fail {
            failing.insert(page_id.to_string());
        } else {
            failing.remove(page_id);
        }
    }

    /// Block listing for this page never completes
    pub fn stall_page(&self, page_id: &str) {
        self.stalled.lock().unwrap().insert(page_id.to_string());
    }

    pub fn rate_limit_search(&self, limited: bool) {
        self.search_rate_limited.store(limited, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentSource for FakeSource {
    async fn search_pages(&self, _page_size: u32) -> SyncResult<Vec<Page>> {
        if self.search_rate_limited.load(Ordering::SeqCst) {
            return Err(SyncError::RemoteFetch {
                target: "pages".to_string(),
                status: Some(429),
                message: "rate_limited".to_string(),
            });
        }
        Ok(self.pages.lock().unwrap().clone())
    }

    async fn list_block_children(
        &self,
        block_id: &str,
        _page_size: u32,
    ) -> SyncResult<Vec<RawBlock>> {
        let stalled = self.stalled.lock().unwrap().contains(block_id);
        if stalled {
            std::future::pending::<()>().await;
        }
        let failing = self.failing.lock().unwrap().contains(block_id);
        if failing {
            return Err(SyncError::RemoteFetch {
                target: format!("blocks of {block_id}"),
                status: Some(502),
                message: "bad gateway".to_string(),
            });
        }

        let blocks = self
            .blocks
            .lock()
            .unwrap()
            .get(block_id)
            .cloned()
            .unwrap_or_default();
        Ok(blocks
            .into_iter()
            .map(|b| serde_json::from_value(b).unwrap())
            .collect())
    }
}

/// Memory cache whose hash writes take `delay` each, like a congested Redis
pub struct SlowBackend {
    inner: MemoryBackend,
    delay: Duration,
}

impl SlowBackend {
    pub fn new(inner: &MemoryBackend, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner: inner.clone(),
            delay,
        })
    }
}

#[async_trait]
impl CacheBackend for SlowBackend {
    async fn connect(&self) -> SyncResult<Box<dyn CacheSession>> {
        Ok(Box::new(SlowSession {
            inner: self.inner.connect().await?,
            delay: self.delay,
        }))
    }
}

struct SlowSession {
    inner: Box<dyn CacheSession>,
    delay: Duration,
}

#[async_trait]
impl CacheSession for SlowSession {
    async fn get_string(&self, key: &str) -> SyncResult<Option<String>> {
        self.inner.get_string(key).await
    }

    async fn set_string(&self, key: &str, value: &str) -> SyncResult<()> {
        self.inner.set_string(key, value).await
    }

    async fn get_hash(&self, key: &str) -> SyncResult<HashMap<String, String>> {
        self.inner.get_hash(key).await
    }

    async fn set_hash(&self, key: &str, fields: &[(&str, &str)]) -> SyncResult<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.set_hash(key, fields).await
    }

    async fn list_range(&self, key: &str) -> SyncResult<Vec<String>> {
        self.inner.list_range(key).await
    }

    async fn push_front(&self, key: &str, value: &str) -> SyncResult<()> {
        self.inner.push_front(key, value).await
    }

    async fn replace_list(&self, key: &str, items: &[String]) -> SyncResult<()> {
        self.inner.replace_list(key, items).await
    }

    async fn delete_key(&self, key: &str) -> SyncResult<()> {
        self.inner.delete_key(key).await
    }

    async fn add_to_set(&self, key: &str, member: &str) -> SyncResult<()> {
        self.inner.add_to_set(key, member).await
    }

    async fn set_members(&self, key: &str) -> SyncResult<Vec<String>> {
        self.inner.set_members(key).await
    }

    async fn replace_set(&self, key: &str, members: &[String]) -> SyncResult<()> {
        self.inner.replace_set(key, members).await
    }

    async fn disconnect(&self) -> SyncResult<()> {
        self.inner.disconnect().await
    }
}

pub fn heading(id: &str, name: &str) -> Value {
    json!({
        "object": "block",
        "id": id,
        "type": "heading_2",
        "heading_2": { "text": [{ "type": "text", "text": { "content": name }, "plain_text": name }] }
    })
}

pub fn todo(id: &str, text: &str, checked: bool) -> Value {
    json!({
        "object": "block",
        "id": id,
        "type": "to_do",
        "to_do": { "checked": checked, "text": [{ "type": "text", "text": { "content": text }, "plain_text": text }] }
    })
}

pub fn paragraph(id: &str) -> Value {
    json!({
        "object": "block",
        "id": id,
        "type": "paragraph",
        "paragraph": { "text": [{ "plain_text": "just notes" }] }
    })
}

/// Page A: Work [Buy milk, Call mom (done)]
/// Page B: orphan, then Home [Mow lawn]
pub fn two_page_source() -> Arc<FakeSource> {
    let source = FakeSource::new();
    source.add_page(
        "page-a",
        "Errands",
        vec![
            heading("a-h1", "Work"),
            todo("a-t1", "Buy milk", false),
            todo("a-t2", "Call mom", true),
        ],
    );
    source.add_page(
        "page-b",
        "House",
        vec![
            todo("b-t0", "orphan", false),
            heading("b-h1", "Home"),
            todo("b-t1", "Mow lawn", false),
        ],
    );
    source
}

pub fn orchestrator(
    source: &Arc<FakeSource>,
    backend: &MemoryBackend,
    options: SyncOptions,
) -> SyncOrchestrator {
    SyncOrchestrator::new(source.clone(), Arc::new(backend.clone()), options)
}

pub fn test_handler(source: &Arc<FakeSource>) -> (DeweyServerHandler, MemoryBackend) {
    let backend = MemoryBackend::new();
    let handler = DeweyServerHandler::with_parts(
        source.clone(),
        Arc::new(backend.clone()),
        SyncOptions::default(),
    );
    (handler, backend)
}

/// (text, complete) pairs of a section
pub fn todo_texts(section: &Section) -> Vec<(String, bool)> {
    section
        .todos
        .iter()
        .map(|t| (t.text.clone(), t.complete))
        .collect()
}
