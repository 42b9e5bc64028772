//! Display sink abstraction.
//!
//! The chat view decides *what* to show and when; a `ChatDisplay` only puts
//! already-formatted text on the screen.

/// Line-oriented output surface (a terminal, a test recorder, ...).
pub trait ChatDisplay: Send + Sync {
    /// Prints one framed chat message, already split into lines.
    fn print_lines(&self, lines: &[String]);

    /// Prints a bare system line, not attributed to any NPC.
    fn print_system(&self, text: &str);

    /// Prints a user-visible error line.
    fn print_error(&self, text: &str);

    /// Shows or hides the "generating" indicator. `npc_id` is `None` when the
    /// pending work is not attributed to an NPC.
    fn set_indicator(&self, npc_id: Option<&str>, active: bool);
}
