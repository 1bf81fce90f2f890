//! Plain-text rendering of pages for the line-based browser.

use std::fmt::Write;

use lumen_types::{Action, ListItem, Page};

/// Renders `page`, numbering items and actions from 1. Items not matching
/// `filter` are hidden but keep their numbers.
pub fn render_page(page: &Page, filter: Option<&str>, depth: usize) -> String {
    let mut out = String::new();
    let title = page.title().unwrap_or(match page {
        Page::List(_) => "Untitled list",
        Page::Detail(_) => "Untitled",
    });
    let _ = writeln!(out, "== {title} == [depth {depth}]");

    match page {
        Page::List(list) => {
            let visible: Vec<(usize, &ListItem)> = list
                .items
                .iter()
                .enumerate()
                .filter(|(_, item)| matches_filter(item, filter))
                .collect();
            if visible.is_empty() {
                let empty = list.empty_text.as_deref().unwrap_or("No items");
                let _ = writeln!(out, "  {empty}");
            }
            for (index, item) in visible {
                let _ = write!(out, "{:>3}. {}", index + 1, item.title);
                if let Some(subtitle) = &item.subtitle {
                    let _ = write!(out, " - {subtitle}");
                }
                if !item.accessories.is_empty() {
                    let _ = write!(out, " [{}]", item.accessories.join(", "));
                }
                if item.detail.is_some() {
                    let _ = write!(out, " (p{})", index + 1);
                }
                out.push('\n');
                for (position, action) in item.actions.iter().enumerate().skip(1) {
                    let _ = writeln!(out, "       {}.{} {}", index + 1, position + 1, describe_action(action));
                }
            }
        }
        Page::Detail(detail) => {
            if let Some(text) = &detail.text {
                let _ = writeln!(out, "{text}");
            } else if detail.command.is_some() {
                let _ = writeln!(out, "(p to show content)");
            }
        }
    }

    for (position, action) in page.actions().iter().enumerate() {
        let _ = writeln!(out, "  a{} {}", position + 1, describe_action(action));
    }
    out
}

fn describe_action(action: &Action) -> String {
    match &action.key {
        Some(key) => format!("{} <{key}>", action.display_title()),
        None => action.display_title().to_string(),
    }
}

/// Case-insensitive substring match on title and subtitle.
pub fn matches_filter(item: &ListItem, filter: Option<&str>) -> bool {
    let Some(filter) = filter.map(str::trim).filter(|filter| !filter.is_empty()) else {
        return true;
    };
    let needle = filter.to_lowercase();
    item.title.to_lowercase().contains(&needle)
        || item
            .subtitle
            .as_deref()
            .is_some_and(|subtitle| subtitle.to_lowercase().contains(&needle))
}
