//! Dewey sync library
//!
//! Pulls to-do blocks out of Notion pages, files them under the heading they
//! appear below, and keeps the result in a Redis cache that a chat UI (or any
//! MCP client) can read quickly.
//!
//! # Architecture
//!
//! Writes flow one way and reads the other:
//! - **Sync**: [`notion::DocumentSource`] → [`flatten`] → [`sync::SyncOrchestrator`] → [`store`]
//! - **Read**: [`store`] → [`reader::CacheReader`] → MCP tools in this crate root
//!
//! Only the orchestrator writes the `sections`/`todos` index sets.
//!
//! # Example
//!
//! ```no_run
//! use dewey_sync::{Config, DeweyServerHandler};
//! use anyhow::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load(None)?;
//!     let handler = DeweyServerHandler::new(&config)?;
//!     let report = handler.refresh().await?;
//!     println!("synced {} pages", report.page_count);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod flatten;
pub mod formatting;
pub mod handlers;
pub mod model;
pub mod notion;
pub mod reader;
pub mod store;
pub mod sync;
pub mod validation;

use mcp_attr::Result as McpResult;
use mcp_attr::server::{McpServer, mcp_server};
use std::sync::{Arc, Mutex, MutexGuard};

pub use config::Config;
pub use error::SyncError;
pub use model::{Page, Section, Todo};
pub use notion::{DocumentSource, NotionClient};
pub use reader::CacheReader;
pub use store::{CacheBackend, CacheSession, MemoryBackend, RedisBackend};
pub use sync::{SyncOptions, SyncOrchestrator, SyncReport};

/// MCP server handler over the Notion TODO cache
///
/// Holds no entity state of its own: every call goes to the cache, and
/// only the report of the latest sync is remembered in memory.
pub struct DeweyServerHandler {
    pub(crate) orchestrator: SyncOrchestrator,
    pub(crate) reader: CacheReader,
    pub(crate) last_report: Mutex<Option<SyncReport>>,
}

impl DeweyServerHandler {
    /// Create a handler talking to Notion and Redis as configured
    ///
    /// # Arguments
    /// * `config` - Loaded configuration; `notion.api_key` must be set
    ///
    /// # Returns
    /// Result containing the handler or an error
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let source = Arc::new(NotionClient::new(config)?);
        let backend = Arc::new(RedisBackend::new(&config.redis.url, config.redis_timeout())?);
        Ok(Self::with_parts(
            source,
            backend,
            SyncOptions::from_config(config),
        ))
    }

    /// Create a handler from explicit parts, e.g. an in-memory cache
    pub fn with_parts(
        source: Arc<dyn DocumentSource>,
        backend: Arc<dyn CacheBackend>,
        options: SyncOptions,
    ) -> Self {
        Self {
            orchestrator: SyncOrchestrator::new(source, Arc::clone(&backend), options),
            reader: CacheReader::new(backend),
            last_report: Mutex::new(None),
        }
    }

    pub fn reader(&self) -> &CacheReader {
        &self.reader
    }

    /// Run a full sync and remember its report
    pub async fn refresh(&self) -> error::Result<SyncReport> {
        let report = self.orchestrator.run_full_sync().await?;
        *self.report_slot() = Some(report.clone());
        Ok(report)
    }

    /// Report of the most recent sync run through this handler
    pub fn last_report(&self) -> Option<SyncReport> {
        self.report_slot().clone()
    }

    fn report_slot(&self) -> MutexGuard<'_, Option<SyncReport>> {
        self.last_report
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// TODO list server backed by Notion pages.
///
/// Every page shared with the Notion integration is scanned for headings and
/// checkbox (to-do) blocks. Each heading starts a **section**; the to-dos below
/// it, up to the next heading, are that section's TODOs. To-dos above the first
/// heading of a page are ignored.
///
/// Key concepts:
/// - **sync**: re-read every shared page from Notion into the cache (slow, run when data looks stale)
/// - **sections**: list everything in the cache (fast)
/// - **section**: show one section by its heading block id
/// - **page_count**: how many pages are monitored
/// - **last_sync**: which pages failed during the last sync, and why
///
/// A TODO's first line is its title; further lines are details.
#[mcp_server]
impl McpServer for DeweyServerHandler {
    /// **Refresh**: Re-read all shared Notion pages into the cache. Reports pages that failed.
    /// **When**: Data looks stale or a page was just shared.
    #[tool]
    async fn sync(&self) -> McpResult<String> {
        self.handle_sync().await
    }

    /// **Status**: How many Notion pages are monitored for TODOs (as of the last sync).
    #[tool]
    async fn page_count(&self) -> McpResult<String> {
        self.handle_page_count().await
    }

    /// **View**: Show one section and its TODOs in document order.
    /// **Tip**: Ids are shown in brackets by sections, e.g. "== Home (1/3 done) [id]".
    #[tool]
    async fn section(
        &self,
        /// Section id (heading block id, dashed or undashed)
        id: String,
        /// Hide completed TODOs (optional, default false)
        exclude_complete: Option<bool>,
    ) -> McpResult<String> {
        self.handle_section(id, exclude_complete).await
    }

    /// **Review**: List all cached sections with their TODOs, most recently synced first.
    #[tool]
    async fn sections(
        &self,
        /// Hide completed TODOs (optional, default false)
        exclude_complete: Option<bool>,
    ) -> McpResult<String> {
        self.handle_sections(exclude_complete).await
    }

    /// **Diagnose**: Show the report of the last sync run by this server, including failed pages.
    #[tool]
    async fn last_sync(&self) -> McpResult<String> {
        self.handle_last_sync().await
    }
}
