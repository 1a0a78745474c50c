//! Section handlers for reading cached TODOs

use crate::DeweyServerHandler;
use crate::error::SyncError;
use crate::formatting;
use crate::validation;
use mcp_attr::{Result as McpResult, bail_public};

impl DeweyServerHandler {
    /// Renders one section after normalizing the caller's id.
    pub async fn handle_section(
        &self,
        id: String,
        exclude_complete: Option<bool>,
    ) -> McpResult<String> {
        let section_id = validation::normalize_block_id(&id)?;

        match self.reader.section(&section_id).await {
            Ok(section) => Ok(formatting::format_section(
                &section,
                exclude_complete.unwrap_or(false),
            )),
            Err(SyncError::SectionNotFound(_)) => {
                bail_public!(
                    _,
                    "Section '{}' not found. Use sections to list cached sections, or sync to refresh the cache.",
                    section_id
                );
            }
            Err(e) => {
                bail_public!(_, "Failed to read section '{}': {}", section_id, e);
            }
        }
    }

    /// Renders every cached section, most recently discovered first.
    pub async fn handle_sections(&self, exclude_complete: Option<bool>) -> McpResult<String> {
        match self.reader.all_sections().await {
            Ok(sections) => Ok(formatting::format_sections(
                &sections,
                exclude_complete.unwrap_or(false),
            )),
            Err(e) => {
                bail_public!(_, "Failed to read sections: {}", e);
            }
        }
    }
}
