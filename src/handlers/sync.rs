//! Sync handlers: run a full sync and report on the last one

use crate::DeweyServerHandler;
use crate::formatting;
use mcp_attr::{Result as McpResult, bail_public};

impl DeweyServerHandler {
    /// Runs a full sync and renders its report, including failed pages.
    pub async fn handle_sync(&self) -> McpResult<String> {
        let report = match self.refresh().await {
            Ok(report) => report,
            Err(e) => {
                bail_public!(_, "Sync failed: {}", e);
            }
        };
        Ok(formatting::format_sync_report(&report))
    }

    /// Renders the report of the most recent sync run by this process.
    pub async fn handle_last_sync(&self) -> McpResult<String> {
        match self.last_report() {
            Some(report) => Ok(formatting::format_sync_report(&report)),
            None => Ok("No sync has run since the server started".to_string()),
        }
    }
}
