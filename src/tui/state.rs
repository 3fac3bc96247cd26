//! TUI state management.
//!
//! Holds everything the interactive screen renders: the resolved network
//! record, the live run state, the session history and the map panel.

use crate::map::MapView;
use crate::network::NetworkInfo;
use crate::run::{ProgressEvent, ResultHistory, TestResult, TestRunState};

/// Error information for display.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorInfo {
    /// Error message
    pub message: String,
    /// Optional suggestion for resolution
    pub suggestion: Option<String>,
}

/// Complete state for rendering the TUI.
#[derive(Debug, Clone)]
pub struct TuiState {
    /// Latest resolved network record
    pub network: NetworkInfo,
    /// A resolution is in flight
    pub resolving: bool,
    /// Live run metrics
    pub run: TestRunState,
    /// Result of the most recent completed run
    pub last_result: Option<TestResult>,
    /// Completed runs, newest first
    pub history: ResultHistory,
    /// Map panel, `None` when the map is disabled
    pub map: Option<MapView>,
    /// Error information (if an error occurred)
    pub error: Option<ErrorInfo>,
    /// Non-blocking notice shown in the status bar
    pub notice: Option<String>,
    /// Terminal width for responsive layout
    pub terminal_width: u16,
}

impl Default for TuiState {
    fn default() -> Self {
        Self {
            network: NetworkInfo::placeholder(true),
            resolving: true,
            run: TestRunState::new(),
            last_result: None,
            history: ResultHistory::new(),
            map: None,
            error: None,
            notice: None,
            terminal_width: 80,
        }
    }
}

impl TuiState {
    /// Create a new TuiState with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the network record after a resolution.
    pub fn set_network(&mut self, network: NetworkInfo) {
        self.notice = network.notice().map(str::to_string);
        self.network = network;
        self.resolving = false;
    }

    pub fn set_resolving(&mut self) {
        self.resolving = true;
    }

    pub fn set_online(&mut self, online: bool) {
        self.network.is_online = online;
    }

    pub fn set_map(&mut self, map: MapView) {
        self.map = Some(map);
    }

    /// Set an error state.
    pub fn set_error(&mut self, message: String, suggestion: Option<String>) {
        self.error = Some(ErrorInfo { message, suggestion });
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// "City, Region, Country", or a placeholder while resolving.
    pub fn server_label(&self) -> String {
        if self.resolving {
            "Detecting...".to_string()
        } else {
            self.network.location.label()
        }
    }

    /// Update state from a progress event.
    pub fn update_from_event(&mut self, event: &ProgressEvent) {
        self.run.update_from_event(event);

        match event {
            ProgressEvent::Completed { result, .. } => {
                self.last_result = Some(result.clone());
                self.history.push(result.clone());
            }
            ProgressEvent::Cancelled | ProgressEvent::Reset => {
                self.last_result = None;
            }
            _ => {}
        }
    }
}
