//! TUI controller for managing the display lifecycle.
//!
//! The TuiController manages the TUI lifecycle, including initialization,
//! rendering, and cleanup. It also provides a progress callback for
//! the run controller to emit events.

use std::io::{self, Stdout};
use std::sync::{Arc, Mutex, MutexGuard};

use crossterm::{
    cursor, execute,
    terminal::{
        disable_raw_mode, enable_raw_mode, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use ratatui::{backend::CrosstermBackend, Terminal};

use super::display_mode::DisplayMode;
use super::renderer::render_frame;
use super::state::TuiState;
use crate::map::MapView;
use crate::network::NetworkInfo;
use crate::run::{ProgressCallback, ProgressEvent};

/// Controller for the TUI display.
///
/// Manages the TUI lifecycle including initialization, rendering,
/// and cleanup. Provides a progress callback for the run controller.
pub struct TuiController {
    /// Current display mode
    mode: DisplayMode,
    /// Shared state for the TUI
    state: Arc<Mutex<TuiState>>,
    /// Terminal instance (only present in TUI mode)
    terminal: Option<Terminal<CrosstermBackend<Stdout>>>,
    /// Whether the terminal has been initialized
    initialized: bool,
}

impl TuiController {
    pub fn new(mode: DisplayMode) -> Self {
        Self {
            mode,
            state: Arc::new(Mutex::new(TuiState::new())),
            terminal: None,
            initialized: false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, TuiState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Initialize the TUI.
    ///
    /// In TUI mode, this enters the alternate screen and hides the cursor.
    /// In other modes, this is a no-op.
    pub fn init(&mut self) -> io::Result<()> {
        if self.mode != DisplayMode::Tui {
            return Ok(());
        }

        enable_raw_mode()?;

        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, cursor::Hide)?;

        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        let size = terminal.size()?;
        self.lock().terminal_width = size.width;

        self.terminal = Some(terminal);
        self.initialized = true;

        Ok(())
    }

    /// Restore the terminal: leave the alternate screen, show the cursor
    /// and disable raw mode.
    pub fn cleanup(&mut self) -> io::Result<()> {
        if !self.initialized {
            return Ok(());
        }

        if let Some(ref mut terminal) = self.terminal {
            execute!(terminal.backend_mut(), LeaveAlternateScreen, cursor::Show)?;
        }

        disable_raw_mode()?;

        self.initialized = false;
        self.terminal = None;

        Ok(())
    }

    pub fn set_network(&self, network: NetworkInfo) {
        self.lock().set_network(network);
    }

    /// Mark a network resolution as in flight.
    pub fn set_resolving(&self) {
        self.lock().set_resolving();
    }

    pub fn set_online(&self, online: bool) {
        self.lock().set_online(online);
    }

    pub fn set_map(&self, map: MapView) {
        self.lock().set_map(map);
    }

    /// Show an error in the status bar. Run results are kept.
    pub fn set_error(&self, message: String, suggestion: Option<String>) {
        self.lock().set_error(message, suggestion);
    }

    pub fn clear_error(&self) {
        self.lock().clear_error();
    }

    /// Render the current state to the terminal.
    ///
    /// In TUI mode, this renders the full TUI. In other modes, this is a
    /// no-op.
    pub fn render(&mut self) -> io::Result<()> {
        if self.mode != DisplayMode::Tui {
            return Ok(());
        }

        if let Some(ref mut terminal) = self.terminal {
            let size = terminal.size()?;

            // Clone state for rendering to avoid holding lock during draw
            let state = {
                let mut guard =
                    self.state.lock().unwrap_or_else(|e| e.into_inner());
                guard.terminal_width = size.width;
                guard.clone()
            };

            terminal.draw(|frame| render_frame(frame, &state))?;
        }

        Ok(())
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> TuiState {
        self.lock().clone()
    }

    /// Get a progress callback for the run controller.
    ///
    /// The callback updates the shared TUI state.
    pub fn progress_callback(&self) -> Arc<dyn ProgressCallback> {
        Arc::new(TuiProgressCallback { state: Arc::clone(&self.state) })
    }
}

impl Drop for TuiController {
    /// Restore the terminal even if cleanup() was not called.
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

/// Progress callback implementation for the TUI.
struct TuiProgressCallback {
    /// Shared state with the TuiController
    state: Arc<Mutex<TuiState>>,
}

impl ProgressCallback for TuiProgressCallback {
    fn on_progress(&self, event: ProgressEvent) {
        match event {
            // Samples are superseded by the next one, so a busy lock
            // (a frame being cloned) can skip them.
            ProgressEvent::PingSample { .. }
            | ProgressEvent::ThroughputSample { .. } => {
                if let Ok(mut state) = self.state.try_lock() {
                    state.update_from_event(&event);
                }
            }
            _ => {
                self.state
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .update_from_event(&event);
            }
        }
    }
}
