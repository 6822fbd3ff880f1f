use std::fmt::Write as _;

use cadence_calendar::{CalendarEntry, CalendarWindow, DayCell, ViewMode};
use cadence_core::ActivityStatus;

/// Plain-text rendering of one calendar window, one block per visible day.
pub fn render_grid(window: &CalendarWindow, cells: &[DayCell]) -> String {
    let (start, end) = window.visible_range();
    let mut out = String::new();
    let mode = match window.mode {
        ViewMode::Week => "week",
        ViewMode::Month => "month",
    };
    let _ = writeln!(out, "{mode} {start} .. {end}");

    for cell in cells {
        if window.mode == ViewMode::Month && !cell.in_anchor_month && cell.entries.is_empty() {
            continue;
        }
        let marker = if cell.is_today { " (today)" } else { "" };
        let _ = writeln!(out, "{}{marker}", cell.date.format("%a %Y-%m-%d"));
        for entry in &cell.entries {
            let _ = writeln!(out, "  {}", entry_line(entry));
        }
        if let Some(label) = cell.overflow_label() {
            let _ = writeln!(out, "  {label}");
        }
    }
    out
}

fn entry_line(entry: &CalendarEntry) -> String {
    let mut line = format!("{} {}", badge(entry), entry.title);
    if entry.occurrence.recurring {
        line.push_str(" ↻");
    }
    if let Some(client) = &entry.client_name {
        let _ = write!(line, " [{client}]");
    }
    line
}

/// Recurring occurrences only know done/not done; single events show their status.
fn badge(entry: &CalendarEntry) -> &'static str {
    if entry.occurrence.completed {
        return "[x]";
    }
    if entry.occurrence.recurring {
        return "[ ]";
    }
    match entry.status {
        ActivityStatus::Pending => "[ ]",
        ActivityStatus::Doing => "[~]",
        ActivityStatus::Completed => "[x]",
    }
}
