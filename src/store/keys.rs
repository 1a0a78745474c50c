//! Cache key layout
//!
//! The UI reads these keys too, so they are part of the external contract.

/// Number of pages seen by the last sync
pub const PAGE_COUNT: &str = "page-count";
/// Set of every known section id
pub const SECTIONS: &str = "sections";
/// Set of every known todo id
pub const TODOS: &str = "todos";

/// Hash {name, id, pageID}
pub fn section(section_id: &str) -> String {
    format!("section-{section_id}")
}

/// List of todo ids, front-pushed, so it reads back in reverse document order
pub fn section_todos(section_id: &str) -> String {
    format!("section-todos-{section_id}")
}

/// Hash {text, complete, id, sectionID}
pub fn todo(todo_id: &str) -> String {
    format!("todo-{todo_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(section("abc"), "section-abc");
        assert_eq!(section_todos("abc"), "section-todos-abc");
        assert_eq!(todo("xyz"), "todo-xyz");
    }
}
