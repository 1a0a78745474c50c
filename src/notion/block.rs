//! Raw Notion block records and their classification

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Result, SyncError};

/// A block exactly as returned by `blocks.children.list`
///
/// The type-specific payload sits under a key named after the block type,
/// so everything other than `id` and `type` is kept as loose JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct RawBlock {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

/// One run of rich text
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RichText {
    #[serde(default)]
    pub plain_text: Option<String>,
    #[serde(default)]
    pub text: Option<TextContent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TextContent {
    pub content: String,
}

impl RichText {
    /// The authored content, falling back to the rendered plain text
    pub fn content(&self) -> &str {
        self.text
            .as_ref()
            .map(|t| t.content.as_str())
            .or(self.plain_text.as_deref())
            .unwrap_or_default()
    }

    /// The rendered plain text, falling back to the authored content
    pub fn plain(&self) -> &str {
        self.plain_text
            .as_deref()
            .or(self.text.as_ref().map(|t| t.content.as_str()))
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct HeadingPayload {
    #[serde(alias = "rich_text")]
    text: Vec<RichText>,
}

#[derive(Debug, Deserialize)]
struct ToDoPayload {
    checked: bool,
    #[serde(alias = "rich_text")]
    text: Vec<RichText>,
}

/// A block reduced to what the flattener cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { id: String, name: String },
    ToDo { id: String, text: String, checked: bool },
    Other { id: String, kind: String },
}

impl RawBlock {
    /// Classify this block, failing with `MalformedBlock` when a heading or
    /// to-do lacks its text payload.
    pub fn classify(&self) -> Result<Block> {
        match self.kind.as_str() {
            "heading_1" | "heading_2" | "heading_3" => {
                let payload: HeadingPayload = self.payload_as()?;
                if payload.text.is_empty() {
                    return Err(self.malformed("heading has no text"));
                }
                let name = payload.text.iter().map(RichText::content).collect();
                Ok(Block::Heading {
                    id: self.id.clone(),
                    name,
                })
            }
            "to_do" => {
                let payload: ToDoPayload = self.payload_as()?;
                let text = payload.text.iter().map(RichText::plain).collect();
                Ok(Block::ToDo {
                    id: self.id.clone(),
                    text,
                    checked: payload.checked,
                })
            }
            other => Ok(Block::Other {
                id: self.id.clone(),
                kind: other.to_string(),
            }),
        }
    }

    fn payload_as<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        let value = self
            .payload
            .get(&self.kind)
            .cloned()
            .ok_or_else(|| self.malformed(format!("missing '{}' payload", self.kind)))?;
        serde_json::from_value(value).map_err(|e| self.malformed(e.to_string()))
    }

    fn malformed(&self, reason: impl Into<String>) -> SyncError {
        SyncError::MalformedBlock {
            block_id: self.id.clone(),
            reason: reason.into(),
        }
    }
}
