//! The simulated speed test run.
//!
//! A run walks idle → ping → download → upload → complete. Each phase is a
//! fixed number of timed steps; every step draws a new sample, advances the
//! overall progress and emits a [`ProgressEvent`].

pub mod controller;
pub mod grade;
pub mod history;
pub mod progress;
pub mod state;

pub use controller::{RunOutcome, SimulationConfig, TestRunController};
pub use grade::Grade;
pub use history::{HistorySummary, ResultHistory, TestResult};
pub use progress::{ProgressCallback, ProgressEvent, TestPhase};
pub use state::TestRunState;
