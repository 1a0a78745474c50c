//! Remote document access
//!
//! The sync layer only depends on the [`DocumentSource`] trait; the HTTP
//! implementation lives in [`client`].

pub mod block;
pub mod client;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::Page;

pub use block::{Block, RawBlock, RichText};
pub use client::NotionClient;

/// Largest page size the Notion API accepts for search and list calls
pub const MAX_PAGE_SIZE: u32 = 100;

/// The two remote calls a full sync needs
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Every page visible to the integration (first result page only)
    async fn search_pages(&self, page_size: u32) -> Result<Vec<Page>>;

    /// Direct children of a block or page, in document order
    async fn list_block_children(&self, block_id: &str, page_size: u32) -> Result<Vec<RawBlock>>;
}
