//! Page count handler

use crate::DeweyServerHandler;
use crate::formatting;
use mcp_attr::{Result as McpResult, bail_public};

impl DeweyServerHandler {
    /// Reports how many pages the last successful sync saw.
    pub async fn handle_page_count(&self) -> McpResult<String> {
        match self.reader.page_count().await {
            Ok(count) => Ok(formatting::format_page_count(count)),
            Err(e) => {
                bail_public!(_, "Failed to read page count: {}", e);
            }
        }
    }
}
