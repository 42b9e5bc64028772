//! Recording display — a `ChatDisplay` that keeps everything it is asked to
//! show.

use std::sync::Mutex;

use termshell_core::display::ChatDisplay;
use tokio::time::Instant;

/// One thing the display was asked to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayRecord {
    /// A framed chat message and the (tokio) instant it was printed.
    Message {
        /// Framed lines.
        lines: Vec<String>,
        /// When it reached the screen.
        at: Instant,
    },
    /// A bare system line.
    System(String),
    /// An error line.
    Error(String),
    /// Indicator toggled.
    Indicator {
        /// NPC the indicator refers to.
        npc_id: Option<String>,
        /// On or off.
        active: bool,
    },
}

/// A display that records every call.
#[derive(Debug, Default)]
pub struct RecordingDisplay {
    records: Mutex<Vec<DisplayRecord>>,
}

impl RecordingDisplay {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn records(&self) -> Vec<DisplayRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Framed messages with their print instants.
    #[must_use]
    pub fn messages(&self) -> Vec<(Vec<String>, Instant)> {
        self.records()
            .into_iter()
            .filter_map(|record| match record {
                DisplayRecord::Message { lines, at } => Some((lines, at)),
                _ => None,
            })
            .collect()
    }

    /// Message bodies (lines between the separator and the footer), joined
    /// with newlines.
    #[must_use]
    pub fn message_bodies(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .map(|(lines, _)| {
                let body_end = lines.len().saturating_sub(1);
                lines.get(2..body_end).unwrap_or_default().join("\n")
            })
            .collect()
    }

    /// System lines.
    #[must_use]
    pub fn system_lines(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .filter_map(|record| match record {
                DisplayRecord::System(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Error lines.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .filter_map(|record| match record {
                DisplayRecord::Error(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    fn push(&self, record: DisplayRecord) {
        self.records.lock().unwrap().push(record);
    }
}

impl ChatDisplay for RecordingDisplay {
    fn print_lines(&self, lines: &[String]) {
        self.push(DisplayRecord::Message {
            lines: lines.to_vec(),
            at: Instant::now(),
        });
    }

    fn print_system(&self, text: &str) {
        self.push(DisplayRecord::System(text.to_owned()));
    }

    fn print_error(&self, text: &str) {
        self.push(DisplayRecord::Error(text.to_owned()));
    }

    fn set_indicator(&self, npc_id: Option<&str>, active: bool) {
        self.push(DisplayRecord::Indicator {
            npc_id: npc_id.map(str::to_owned),
            active,
        });
    }
}
