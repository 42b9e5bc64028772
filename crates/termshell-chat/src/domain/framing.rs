//! Text framing for delivered chat messages.

use chrono::{DateTime, Utc};

use super::interaction::DeliveryEntry;

/// Width of the separator and footer rules.
pub const RULE_WIDTH: usize = 48;

/// Lays out one message as header, separator, body and footer lines.
#[must_use]
pub fn frame_message(entry: &DeliveryEntry, at: DateTime<Utc>) -> Vec<String> {
    let mut lines = Vec::with_capacity(entry.message.lines().count() + 3);
    lines.push(format!(">> {} [{}]", entry.npc_id, at.format("%H:%M:%S")));
    lines.push("-".repeat(RULE_WIDTH));
    if entry.message.is_empty() {
        lines.push(String::new());
    } else {
        lines.extend(entry.message.lines().map(str::to_owned));
    }
    lines.push("=".repeat(RULE_WIDTH));
    lines
}
