//! Transcript export
//!
//! Human-readable export of a conversation. Turn order and content pass
//! through unchanged; only line endings are normalized.

use crate::store::Turn;
use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::path::Path;

/// Render a conversation to the export text format.
pub fn render_export(name: &str, turns: &[Turn], exported_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "CodeCollab Conversation Export");
    let _ = writeln!(out, "{}", "=".repeat(40));
    let _ = writeln!(out, "Conversation: {name}");
    let _ = writeln!(out, "Date: {}", exported_at.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "Total messages: {}", turns.len());
    let _ = writeln!(out, "{}", "=".repeat(40));
    let _ = writeln!(out);

    for (i, turn) in turns.iter().enumerate() {
        let _ = writeln!(out, "Message #{}", i + 1);
        let _ = writeln!(out, "From: {}", turn.role);
        let _ = writeln!(out, "Content:");
        let _ = writeln!(out, "{}", turn.content.replace("\r\n", "\n").replace('\r', "\n"));
        let _ = writeln!(out, "{}", "-".repeat(20));
        let _ = writeln!(out);
    }

    out
}

/// Write the export to a file.
pub fn export_to_file(path: &Path, name: &str, turns: &[Turn]) -> std::io::Result<()> {
    std::fs::write(path, render_export(name, turns, Utc::now()))
}
