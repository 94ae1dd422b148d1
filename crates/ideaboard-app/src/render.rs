use std::fmt::Write;

use uuid::Uuid;

use ideaboard_types::Idea;

use crate::page::{IdeaDraft, Level, Notification, PageState};

const TITLE: &str = "Messaging Ideas";
const MAX_CELL: usize = 40;
const HEADERS: [&str; 5] = ["ID", "Title", "Description", "Category", "Created"];

/// First block of the uuid; enough to address a row by prefix.
pub fn short_id(id: Uuid) -> String {
    id.to_string()[..8].to_string()
}

fn clip(s: &str) -> String {
    if s.chars().count() <= MAX_CELL {
        return s.to_string();
    }
    let mut clipped: String = s.chars().take(MAX_CELL - 1).collect();
    clipped.push('…');
    clipped
}

fn row(idea: &Idea) -> [String; 5] {
    [
        short_id(idea.id),
        clip(&idea.title),
        clip(idea.description.as_deref().unwrap_or("")),
        // Not a column of the ideas table.
        "-".to_string(),
        idea.created_at.format("%Y-%m-%d %H:%M").to_string(),
    ]
}

pub fn table(ideas: &[Idea]) -> String {
    let mut sorted: Vec<&Idea> = ideas.iter().collect();
    sorted.sort_by_key(|idea| idea.created_at);
    let rows: Vec<[String; 5]> = sorted.into_iter().map(row).collect();

    let mut widths = HEADERS.map(|h| h.chars().count());
    for cells in &rows {
        for (width, cell) in widths.iter_mut().zip(cells) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let line = |out: &mut String, cells: &[&str]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect();
        let _ = writeln!(out, "{}", padded.join(" | ").trim_end());
    };

    line(&mut out, &HEADERS);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(out, "{}", rule.join("-+-"));
    for cells in &rows {
        let cells: Vec<&str> = cells.iter().map(String::as_str).collect();
        line(&mut out, &cells);
    }
    if rows.is_empty() {
        let _ = writeln!(out, "(no ideas yet)");
    }
    out
}

fn form(draft: &IdeaDraft) -> String {
    format!(
        "New idea  title: \"{}\"  description: \"{}\"  category: \"{}\"\n",
        draft.title, draft.description, draft.category
    )
}

fn notification(n: &Notification) -> String {
    let tag = match n.level {
        Level::Success => "ok",
        Level::Warning => "warn",
        Level::Error => "error",
    };
    format!("[{}] {}\n", tag, n.message)
}

/// Whole page. While loading only the indicator is shown; a failed list
/// shows the error and nothing else.
pub fn page(
    state: &PageState,
    draft: &IdeaDraft,
    in_flight: usize,
    notifications: &[&Notification],
) -> String {
    let ideas = match state {
        PageState::Loading => return "Loading ideas...\n".to_string(),
        PageState::Failed(message) => return format!("Error: {}\n", message),
        PageState::Ready(ideas) => ideas,
    };

    let mut out = format!("{}\n\n", TITLE);
    out.push_str(&form(draft));
    out.push('\n');
    out.push_str(&table(ideas));

    if in_flight > 0 {
        let _ = writeln!(out, "Saving... ({} in flight)", in_flight);
    }
    for n in notifications {
        out.push_str(&notification(n));
    }
    out
}
