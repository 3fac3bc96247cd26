//! Display mode detection.
//!
//! Chooses between the interactive TUI, silent batch output, and JSON
//! output based on CLI flags and terminal capabilities.

/// The display mode for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// Interactive TUI with live gauges and key bindings
    Tui,
    /// No live output; a plain summary once every run has finished
    Silent,
    /// JSON mode - structured output only
    Json,
}

impl DisplayMode {
    /// Determine display mode from CLI flags and environment.
    ///
    /// `--json` wins regardless of the terminal. Otherwise a TTY gets the
    /// TUI unless `batch_flag` asks for plain output.
    pub fn detect(json_flag: bool, batch_flag: bool, is_tty: bool) -> Self {
        if json_flag {
            DisplayMode::Json
        } else if is_tty && !batch_flag {
            DisplayMode::Tui
        } else {
            DisplayMode::Silent
        }
    }

    pub fn is_interactive(&self) -> bool {
        *self == DisplayMode::Tui
    }
}
