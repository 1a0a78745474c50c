//! Turn a page's block list into sections of todos
//!
//! Headings open sections and to-dos attach to the most recent section.
//! One linear pass, no lookahead: block order is the visual order in Notion
//! and is kept as-is.

use tracing::{debug, warn};

use crate::model::{Page, Section, Todo};
use crate::notion::{Block, RawBlock};

/// The sections of one page plus what had to be thrown away
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenedPage {
    pub page: Page,
    /// Sections in document order
    pub sections: Vec<Section>,
    /// To-dos that appeared before any heading
    pub orphaned_todos: usize,
    /// Headings and to-dos that could not be parsed
    pub malformed_blocks: usize,
}

impl FlattenedPage {
    pub fn todo_count(&self) -> usize {
        self.sections.iter().map(|s| s.todos.len()).sum()
    }
}

pub fn flatten_page(page: &Page, blocks: &[RawBlock]) -> FlattenedPage {
    let mut sections: Vec<Section> = Vec::new();
    // Index into `sections` of the heading currently collecting to-dos
    let mut current: Option<usize> = None;
    let mut orphaned_todos = 0;
    let mut malformed_blocks = 0;

    for raw in blocks {
        let block = match raw.classify() {
            Ok(block) => block,
            Err(err) => {
                warn!(page_id = %page.id, error = %err, "Skipping malformed block");
                malformed_blocks += 1;
                // To-dos under an unreadable heading must not land in the previous section
                if raw.kind.starts_with("heading") {
                    current = None;
                }
                continue;
            }
        };

        match block {
            Block::Heading { id, name } => {
                debug!(page_id = %page.id, section = %name, "== {}", name);
                sections.push(Section::new(id, name, page.id.clone()));
                current = Some(sections.len() - 1);
            }
            Block::ToDo { id, text, checked } => match current {
                Some(index) => {
                    let section = &mut sections[index];
                    debug!(
                        section_id = %section.id,
                        "{} {}",
                        if checked { "✅" } else { "◻️" },
                        text
                    );
                    section.todos.push(Todo {
                        id,
                        text,
                        complete: checked,
                        section_id: section.id.clone(),
                    });
                }
                None => {
                    debug!(page_id = %page.id, todo_id = %id, "Dropping to-do outside any section");
                    orphaned_todos += 1;
                }
            },
            Block::Other { .. } => {}
        }
    }

    FlattenedPage {
        page: page.clone(),
        sections,
        orphaned_todos,
        malformed_blocks,
    }
}
