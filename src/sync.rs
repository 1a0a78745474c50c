//! Full refresh of the cache from Notion
//!
//! One sync opens a single cache session, lists every shared page, and then
//! syncs all pages concurrently on the current task. A page that fails is
//! recorded in the [`SyncReport`] and does not affect its siblings.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::flatten::flatten_page;
use crate::model::{Page, Section, Todo};
use crate::notion::{DocumentSource, MAX_PAGE_SIZE, RawBlock};
use crate::store::{CacheBackend, CacheSession, keys, release};

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub page_size: u32,
    /// Overall bound for fetching page contents; cache writes are not cut short
    pub deadline: Option<Duration>,
    /// Reap ids that the current sync no longer produced
    pub prune_stale: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            deadline: None,
            prune_stale: true,
        }
    }
}

impl SyncOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            page_size: config.page_size(),
            deadline: config.sync_deadline(),
            prune_stale: config.sync.prune_stale,
        }
    }
}

/// What one page contributed to the cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageSummary {
    pub page_id: String,
    pub title: String,
    pub sections: usize,
    pub todos: usize,
    pub orphaned_todos: usize,
    pub malformed_blocks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageFailure {
    pub page_id: String,
    pub title: String,
    pub reason: String,
}

/// Outcome of one full sync
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Pages returned by the search, as written to `page-count`
    pub page_count: usize,
    pub succeeded: Vec<PageSummary>,
    pub failed: Vec<PageFailure>,
    /// Whether stale ids were reaped from the index sets
    pub pruned: bool,
    pub stale_sections_removed: usize,
    pub stale_todos_removed: usize,
}

impl SyncReport {
    fn new(started_at: DateTime<Utc>, page_count: usize) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            page_count,
            succeeded: Vec::new(),
            failed: Vec::new(),
            pruned: false,
            stale_sections_removed: 0,
            stale_todos_removed: 0,
        }
    }

    /// True when every page synced
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn section_count(&self) -> usize {
        self.succeeded.iter().map(|p| p.sections).sum()
    }

    pub fn todo_count(&self) -> usize {
        self.succeeded.iter().map(|p| p.todos).sum()
    }
}

/// Ids written for one page, used for pruning
struct WrittenPage {
    summary: PageSummary,
    section_ids: Vec<String>,
    todo_ids: Vec<String>,
}

pub struct SyncOrchestrator {
    source: Arc<dyn DocumentSource>,
    backend: Arc<dyn CacheBackend>,
    options: SyncOptions,
}

impl SyncOrchestrator {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        backend: Arc<dyn CacheBackend>,
        options: SyncOptions,
    ) -> Self {
        Self {
            source,
            backend,
            options,
        }
    }

    /// Refresh the whole cache from Notion.
    ///
    /// Fails only when the cache cannot be reached, the page search fails, or
    /// the page count cannot be written; per-page failures end up in the report.
    #[instrument(skip(self), name = "full_sync")]
    pub async fn run_full_sync(&self) -> Result<SyncReport> {
        let started_at = Utc::now();
        let session = self.backend.connect().await?;
        let result = self.sync_all(session.as_ref(), started_at).await;
        release(session).await;
        result
    }

    async fn sync_all(
        &self,
        session: &dyn CacheSession,
        started_at: DateTime<Utc>,
    ) -> Result<SyncReport> {
        info!("Loading pages from Notion...");
        let pages = self.source.search_pages(self.options.page_size).await?;
        session
            .set_string(keys::PAGE_COUNT, &pages.len().to_string())
            .await?;

        let deadline = self.options.deadline.map(|d| Instant::now() + d);
        let outcomes = join_all(
            pages
                .iter()
                .map(|page| self.sync_page(session, page, deadline)),
        )
        .await;

        let mut report = SyncReport::new(started_at, pages.len());
        let mut section_ids = Vec::new();
        let mut todo_ids = Vec::new();
        for (page, outcome) in pages.iter().zip(outcomes) {
            match outcome {
                Ok(written) => {
                    section_ids.extend(written.section_ids);
                    todo_ids.extend(written.todo_ids);
                    report.succeeded.push(written.summary);
                }
                Err(err) => {
                    error!(page_id = %page.id, title = %page.title, error = %err, "Page sync failed");
                    report.failed.push(PageFailure {
                        page_id: page.id.clone(),
                        title: page.title.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        if self.options.prune_stale {
            if report.is_complete() {
                match prune_indices(session, &section_ids, &todo_ids).await {
                    Ok((sections, todos)) => {
                        report.pruned = true;
                        report.stale_sections_removed = sections;
                        report.stale_todos_removed = todos;
                    }
                    Err(err) => warn!(error = %err, "Failed to prune stale cache entries"),
                }
            } else {
                warn!(
                    failed = report.failed.len(),
                    "Skipping pruning of stale cache entries because some pages failed"
                );
            }
        }

        report.finished_at = Utc::now();
        info!(
            pages = report.page_count,
            failed = report.failed.len(),
            sections = report.section_count(),
            todos = report.todo_count(),
            "Full sync finished"
        );
        Ok(report)
    }

    /// Fetch a page's blocks, bounded by the sync deadline when one is set
    async fn fetch_blocks_within(
        &self,
        page: &Page,
        deadline: Option<Instant>,
    ) -> Result<Vec<RawBlock>> {
        let fetch = self
            .source
            .list_block_children(&page.id, self.options.page_size);
        let Some(deadline) = deadline else {
            return fetch.await;
        };
        match tokio::time::timeout_at(deadline, fetch).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout {
                operation: format!("fetching page '{}'", page.title),
                after: self.options.deadline.unwrap_or_default(),
            }),
        }
    }

    /// Fetch, flatten and write one page.
    ///
    /// Only the fetch is subject to the deadline. Once writing starts every
    /// section runs to completion, so a slow cache never leaves a section
    /// half rewritten.
    #[instrument(skip_all, fields(page_id = %page.id))]
    async fn sync_page(
        &self,
        session: &dyn CacheSession,
        page: &Page,
        deadline: Option<Instant>,
    ) -> Result<WrittenPage> {
        let blocks = self.fetch_blocks_within(page, deadline).await?;
        info!(title = %page.title, "Processing children for page");

        let flat = flatten_page(page, &blocks);
        let batch = PageBatch { session };
        let outcomes = join_all(flat.sections.iter().map(|s| batch.write_section(s))).await;

        let mut todo_ids = Vec::with_capacity(flat.todo_count());
        let mut first_error = None;
        for outcome in outcomes {
            match outcome {
                Ok(ids) => todo_ids.extend(ids),
                Err(err) => {
                    warn!(error = %err, "Failed to write section");
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }

        Ok(WrittenPage {
            summary: PageSummary {
                page_id: page.id.clone(),
                title: page.title.clone(),
                sections: flat.sections.len(),
                todos: flat.todo_count(),
                orphaned_todos: flat.orphaned_todos,
                malformed_blocks: flat.malformed_blocks,
            },
            section_ids: flat.sections.iter().map(|s| s.id.clone()).collect(),
            todo_ids,
        })
    }
}

/// Cache writes for one page
struct PageBatch<'a> {
    session: &'a dyn CacheSession,
}

impl<'a> PageBatch<'a> {
    /// Write the section hash and index it.
    ///
    /// The returned handle is the only way to record todo ids for the
    /// section, and its list is swapped in whole by [`OpenSection::finish`].
    /// Until then readers keep seeing the previous sync's list.
    async fn open_section(&self, section: &'a Section) -> Result<OpenSection<'a>> {
        self.session
            .set_hash(&keys::section(&section.id), &section.hash_fields())
            .await?;
        self.session.add_to_set(keys::SECTIONS, &section.id).await?;

        Ok(OpenSection {
            session: self.session,
            section,
            appended: Vec::with_capacity(section.todos.len()),
        })
    }

    /// Write a section and its todos, returning the todo ids in document order
    async fn write_section(&self, section: &'a Section) -> Result<Vec<String>> {
        let mut open = self.open_section(section).await?;
        for todo in &section.todos {
            open.append(todo).await?;
        }
        open.finish().await
    }
}

/// A section whose todos are being written for this sync
struct OpenSection<'a> {
    session: &'a dyn CacheSession,
    section: &'a Section,
    appended: Vec<String>,
}

impl OpenSection<'_> {
    async fn append(&mut self, todo: &Todo) -> Result<()> {
        self.session
            .set_hash(&keys::todo(&todo.id), &todo.hash_fields())
            .await?;
        self.session.add_to_set(keys::TODOS, &todo.id).await?;
        self.appended.push(todo.id.clone());
        Ok(())
    }

    /// Replace the section's todo list in one step.
    ///
    /// The stored list keeps the front-pushed layout: newest id at the head.
    async fn finish(self) -> Result<Vec<String>> {
        let head_first: Vec<String> = self.appended.iter().rev().cloned().collect();
        self.session
            .replace_list(&keys::section_todos(&self.section.id), &head_first)
            .await?;
        debug!(
            section_id = %self.section.id,
            section = %self.section.name,
            todos = self.appended.len(),
            "Wrote section"
        );
        Ok(self.appended)
    }
}

/// Drop ids the current sync did not produce and replace both index sets.
///
/// Returns the number of stale sections and todos removed.
async fn prune_indices(
    session: &dyn CacheSession,
    section_ids: &[String],
    todo_ids: &[String],
) -> Result<(usize, usize)> {
    let sections = prune_index(session, keys::SECTIONS, section_ids, |id| {
        vec![keys::section(id), keys::section_todos(id)]
    })
    .await?;
    let todos = prune_index(session, keys::TODOS, todo_ids, |id| vec![keys::todo(id)]).await?;
    if sections + todos > 0 {
        info!(sections, todos, "Removed stale cache entries");
    }
    Ok((sections, todos))
}

async fn prune_index(
    session: &dyn CacheSession,
    index_key: &str,
    current: &[String],
    entity_keys: impl Fn(&str) -> Vec<String>,
) -> Result<usize> {
    let live: HashSet<&str> = current.iter().map(String::as_str).collect();
    let stale: Vec<String> = session
        .set_members(index_key)
        .await?
        .into_iter()
        .filter(|id| !live.contains(id.as_str()))
        .collect();

    for id in &stale {
        for key in entity_keys(id) {
            session.delete_key(&key).await?;
        }
    }

    let mut members = current.to_vec();
    members.sort();
    members.dedup();
    session.replace_set(index_key, &members).await?;
    Ok(stale.len())
}
