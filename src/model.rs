//! Page, section and todo entities
//!
//! These are transient: they are rebuilt from Notion on every sync and from
//! the cache on every read. The cache hash encoding lives here so that the
//! writer and the reader cannot drift apart.

use std::collections::HashMap;

use crate::error::{Result, SyncError};

/// A Notion page shared with the integration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub id: String,
    pub title: String,
}

/// A group of todos introduced by a heading block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Id of the heading block
    pub id: String,
    /// Heading text; not unique across pages
    pub name: String,
    pub page_id: String,
    /// Todos in document order
    pub todos: Vec<Todo>,
}

/// A checkbox item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Todo {
    /// Id of the to-do block
    pub id: String,
    /// Raw text; a newline separates the headline from optional details
    pub text: String,
    pub complete: bool,
    pub section_id: String,
}

impl Section {
    pub fn new(id: impl Into<String>, name: impl Into<String>, page_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            page_id: page_id.into(),
            todos: Vec::new(),
        }
    }

    pub fn completed_count(&self) -> usize {
        self.todos.iter().filter(|t| t.complete).count()
    }

    /// Fields of the `section-<id>` hash
    pub(crate) fn hash_fields(&self) -> [(&'static str, &str); 3] {
        [
            ("name", self.name.as_str()),
            ("id", self.id.as_str()),
            ("pageID", self.page_id.as_str()),
        ]
    }

    /// Rebuild a section (without todos) from its cached hash
    pub(crate) fn from_hash(key: &str, fields: &HashMap<String, String>) -> Result<Self> {
        Ok(Self::new(
            required(key, fields, "id")?,
            required(key, fields, "name")?,
            required(key, fields, "pageID")?,
        ))
    }
}

impl Todo {
    /// First line of the text
    pub fn headline(&self) -> &str {
        self.text.split('\n').next().unwrap_or_default()
    }

    /// Everything after the first newline, if non-empty
    pub fn details(&self) -> Option<&str> {
        self.text
            .split_once('\n')
            .map(|(_, rest)| rest)
            .filter(|rest| !rest.trim().is_empty())
    }

    /// Fields of the `todo-<id>` hash
    pub(crate) fn hash_fields(&self) -> [(&'static str, &str); 4] {
        [
            ("text", self.text.as_str()),
            ("complete", if self.complete { "true" } else { "false" }),
            ("id", self.id.as_str()),
            ("sectionID", self.section_id.as_str()),
        ]
    }

    pub(crate) fn from_hash(key: &str, fields: &HashMap<String, String>) -> Result<Self> {
        let complete = match required(key, fields, "complete")?.as_str() {
            "true" => true,
            "false" => false,
            other => {
                return Err(SyncError::corrupt(
                    key,
                    format!("field 'complete' holds '{other}', expected true or false"),
                ));
            }
        };

        Ok(Self {
            id: required(key, fields, "id")?,
            text: required(key, fields, "text")?,
            complete,
            section_id: required(key, fields, "sectionID")?,
        })
    }
}

fn required(key: &str, fields: &HashMap<String, String>, name: &str) -> Result<String> {
    fields
        .get(name)
        .cloned()
        .ok_or_else(|| SyncError::corrupt(key, format!("missing field '{name}'")))
}
