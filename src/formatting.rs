//! Plain-text rendering of cached sections and sync results
//!
//! The first line of a todo is its headline and anything after the first
//! newline is shown as details. Completed todos are struck through with
//! `~text~`, which chat clients render as strikethrough.

use crate::model::{Section, Todo};
use crate::sync::SyncReport;

/// Describe how many pages are being monitored
pub fn format_page_count(count: u64) -> String {
    if count == 0 {
        return "Not monitoring any pages yet. Share a page with the integration in Notion to start setting up your TODOs.".to_string();
    }
    let noun = if count == 1 { "page" } else { "pages" };
    format!(
        "Currently monitoring {count} {noun} for TODOs. Share more pages with the integration to look for more TODOs."
    )
}

fn format_todo(todo: &Todo) -> String {
    let mut headline = todo.headline().to_string();
    let mut details = todo.details().map(str::to_string);
    if todo.complete {
        headline = format!("~{}~", headline.trim());
        details = details.map(|d| format!("~{}~", d.trim()));
    }

    let mark = if todo.complete { "✅" } else { "◻️" };
    let mut line = format!("  {mark} {headline} [{}]\n", todo.id);
    if let Some(details) = details {
        for detail_line in details.lines() {
            line.push_str(&format!("      {detail_line}\n"));
        }
    }
    line
}

/// Render one section; with `exclude_complete` finished todos are hidden
pub fn format_section(section: &Section, exclude_complete: bool) -> String {
    let mut result = format!(
        "== {} ({}/{} done) [{}]\n",
        section.name,
        section.completed_count(),
        section.todos.len(),
        section.id
    );

    let visible: Vec<&Todo> = section
        .todos
        .iter()
        .filter(|t| !(exclude_complete && t.complete))
        .collect();
    if visible.is_empty() {
        result.push_str("  (no TODOs)\n");
    }
    for todo in visible {
        result.push_str(&format_todo(todo));
    }
    result
}

pub fn format_sections(sections: &[Section], exclude_complete: bool) -> String {
    if sections.is_empty() {
        return "No sections found".to_string();
    }

    let mut result = format!("Found {} section(s):\n\n", sections.len());
    for section in sections {
        result.push_str(&format_section(section, exclude_complete));
        result.push('\n');
    }
    result
}

pub fn format_sync_report(report: &SyncReport) -> String {
    let elapsed = report.finished_at - report.started_at;
    let mut result = format!(
        "Synced {} of {} page(s) in {}ms: {} section(s), {} TODO(s)\n",
        report.succeeded.len(),
        report.page_count,
        elapsed.num_milliseconds(),
        report.section_count(),
        report.todo_count()
    );

    for page in &report.succeeded {
        result.push_str(&format!(
            "- {} [{}]: {} section(s), {} TODO(s)",
            page.title, page.page_id, page.sections, page.todos
        ));
        if page.orphaned_todos > 0 {
            result.push_str(&format!(", {} outside any heading", page.orphaned_todos));
        }
        if page.malformed_blocks > 0 {
            result.push_str(&format!(", {} unreadable block(s)", page.malformed_blocks));
        }
        result.push('\n');
    }

    if !report.failed.is_empty() {
        result.push_str(&format!("Failed page(s): {}\n", report.failed.len()));
        for failure in &report.failed {
            result.push_str(&format!(
                "- {} [{}]: {}\n",
                failure.title, failure.page_id, failure.reason
            ));
        }
    }

    if report.pruned && report.stale_sections_removed + report.stale_todos_removed > 0 {
        result.push_str(&format!(
            "Removed {} stale section(s) and {} stale TODO(s)\n",
            report.stale_sections_removed, report.stale_todos_removed
        ));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section() -> Section {
        let mut section = Section::new("s-1", "Home", "p-1");
        section.todos.push(Todo {
            id: "t-1".to_string(),
            text: "Fix sink\nLeaking under cabinet".to_string(),
            complete: false,
            section_id: "s-1".to_string(),
        });
        section.todos.push(Todo {
            id: "t-2".to_string(),
            text: " Mow lawn ".to_string(),
            complete: true,
            section_id: "s-1".to_string(),
        });
        section
    }

    #[test]
    fn test_page_count_wording() {
        assert!(format_page_count(0).starts_with("Not monitoring any pages"));
        assert!(format_page_count(1).contains("monitoring 1 page for"));
        assert!(format_page_count(2).contains("monitoring 2 pages for"));
    }

    #[test]
    fn test_section_rendering() {
        let text = format_section(&section(), false);
        assert!(text.starts_with("== Home (1/2 done) [s-1]\n"));
        assert!(text.contains("◻️ Fix sink [t-1]\n      Leaking under cabinet\n"));
        assert!(text.contains("✅ ~Mow lawn~ [t-2]"));
    }

    #[test]
    fn test_exclude_complete() {
        let text = format_section(&section(), true);
        assert!(text.contains("Fix sink"));
        assert!(!text.contains("Mow lawn"));

        let mut done = section();
        done.todos.remove(0);
        assert!(format_section(&done, true).contains("(no TODOs)"));
    }

    #[test]
    fn test_empty_section_list() {
        assert_eq!(format_sections(&[], false), "No sections found");
    }
}
