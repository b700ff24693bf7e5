//! Terminal rendering of view snapshots.

use std::fmt::Write as _;

use contact_core::ViewSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

pub fn render(snapshot: &ViewSnapshot, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(snapshot)),
        OutputFormat::Json => Ok(serde_json::to_string(snapshot)?),
    }
}

pub fn render_text(snapshot: &ViewSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "contacts ({}, sorted by {}):",
        snapshot.contacts.len(),
        snapshot.sort_selector
    );
    if snapshot.contacts.is_empty() {
        out.push_str("  (none)\n");
    }
    for contact in &snapshot.contacts {
        let id = contact
            .id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "  [{id:>4}] {} {}  {}",
            contact.first_name, contact.last_name, contact.phone_number
        );
    }

    let dialog = if snapshot.dialog_visible {
        "open"
    } else {
        "closed"
    };
    let _ = write!(
        out,
        "draft: first={:?} last={:?} phone={:?} (dialog {dialog})",
        snapshot.first_name, snapshot.last_name, snapshot.phone_number
    );
    out
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
