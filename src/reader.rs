//! Read sections and todos back out of the cache

use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{instrument, warn};

use crate::error::{Result, SyncError};
use crate::model::{Section, Todo};
use crate::store::{CacheBackend, CacheSession, keys, release};

/// Rebuilds entities from the cache, one session per call
#[derive(Clone)]
pub struct CacheReader {
    backend: Arc<dyn CacheBackend>,
}

impl CacheReader {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    /// Number of pages seen by the last successful sync; 0 before the first one
    #[instrument(skip(self))]
    pub async fn page_count(&self) -> Result<u64> {
        let session = self.backend.connect().await?;
        let result = read_page_count(session.as_ref()).await;
        release(session).await;
        result
    }

    /// One section with its todos in document order
    #[instrument(skip(self))]
    pub async fn section(&self, section_id: &str) -> Result<Section> {
        let session = self.backend.connect().await?;
        let result = read_section(session.as_ref(), section_id).await;
        release(session).await;
        result
    }

    /// Every section that has at least one indexed todo.
    ///
    /// Sections come back in reverse order of discovery while walking the
    /// todo index, which roughly puts the most recently synced first.
    #[instrument(skip(self))]
    pub async fn all_sections(&self) -> Result<Vec<Section>> {
        let session = self.backend.connect().await?;
        let result = read_all_sections(session.as_ref()).await;
        release(session).await;
        result
    }
}

async fn read_page_count(session: &dyn CacheSession) -> Result<u64> {
    match session.get_string(keys::PAGE_COUNT).await? {
        None => Ok(0),
        Some(raw) => raw.trim().parse().map_err(|_| {
            SyncError::corrupt(keys::PAGE_COUNT, format!("'{raw}' is not a page count"))
        }),
    }
}

async fn read_section(session: &dyn CacheSession, section_id: &str) -> Result<Section> {
    let mut section = load_section_header(session, section_id)
        .await?
        .ok_or_else(|| SyncError::SectionNotFound(section_id.to_string()))?;

    let todo_ids = ordered_todo_ids(session, section_id).await?;
    let todos = join_all(todo_ids.iter().map(|id| load_todo(session, id))).await;
    for todo in todos {
        if let Some(todo) = todo? {
            section.todos.push(todo);
        }
    }
    Ok(section)
}

async fn read_all_sections(session: &dyn CacheSession) -> Result<Vec<Section>> {
    let todo_ids = session.set_members(keys::TODOS).await?;
    let loaded = join_all(todo_ids.iter().map(|id| load_todo(session, id))).await;

    // Section ids in the order their first todo was seen
    let mut discovered: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut todos_by_id: HashMap<String, Todo> = HashMap::new();
    for todo in loaded {
        let Some(todo) = todo? else {
            continue;
        };
        if seen.insert(todo.section_id.clone()) {
            discovered.push(todo.section_id.clone());
        }
        todos_by_id.insert(todo.id.clone(), todo);
    }

    let assembled = join_all(
        discovered
            .iter()
            .map(|id| assemble_section(session, id, &todos_by_id)),
    )
    .await;

    let mut sections = Vec::with_capacity(assembled.len());
    for section in assembled.into_iter().rev() {
        if let Some(section) = section? {
            sections.push(section);
        }
    }
    Ok(sections)
}

async fn assemble_section(
    session: &dyn CacheSession,
    section_id: &str,
    todos_by_id: &HashMap<String, Todo>,
) -> Result<Option<Section>> {
    let Some(mut section) = load_section_header(session, section_id).await? else {
        warn!(section_id, "Todos reference a section that is no longer cached");
        return Ok(None);
    };

    for id in ordered_todo_ids(session, section_id).await? {
        match todos_by_id.get(&id) {
            Some(todo) => section.todos.push(todo.clone()),
            None => warn!(section_id, todo_id = %id, "Section lists a todo that is not indexed"),
        }
    }
    Ok(Some(section))
}

async fn load_section_header(
    session: &dyn CacheSession,
    section_id: &str,
) -> Result<Option<Section>> {
    let key = keys::section(section_id);
    let fields = session.get_hash(&key).await?;
    if fields.is_empty() {
        return Ok(None);
    }
    Section::from_hash(&key, &fields).map(Some)
}

/// Todo ids of a section in document order.
///
/// The sync front-pushes ids, so the stored list is reversed.
async fn ordered_todo_ids(session: &dyn CacheSession, section_id: &str) -> Result<Vec<String>> {
    let mut ids = session
        .list_range(&keys::section_todos(section_id))
        .await?;
    ids.reverse();
    Ok(ids)
}

async fn load_todo(session: &dyn CacheSession, todo_id: &str) -> Result<Option<Todo>> {
    let key = keys::todo(todo_id);
    let fields = session.get_hash(&key).await?;
    if fields.is_empty() {
        warn!(todo_id, "Todo is indexed but not cached");
        return Ok(None);
    }
    Todo::from_hash(&key, &fields).map(Some)
}
