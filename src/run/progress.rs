//! Progress event types and callback interface.
//!
//! Defines the events emitted by the run controller to update presentation
//! layers and the callback trait for receiving these events.

use serde::Serialize;

use super::history::TestResult;

/// Phases of a simulated run.
///
/// Variants are declared in run order, so the derived `Ord` matches the
/// order phases are entered.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TestPhase {
    /// No run in progress
    Idle,
    /// Sampling ping
    Ping,
    /// Ramping the download speed
    Download,
    /// Ramping the upload speed
    Upload,
    /// Run finished, metrics frozen
    Complete,
}

impl TestPhase {
    /// Whether a run is actively sampling in this phase.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            TestPhase::Ping | TestPhase::Download | TestPhase::Upload
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            TestPhase::Idle => "Ready",
            TestPhase::Ping => "Testing Ping",
            TestPhase::Download => "Download",
            TestPhase::Upload => "Upload",
            TestPhase::Complete => "Complete",
        }
    }
}

/// Direction of a simulated throughput sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThroughputDirection {
    Download,
    Upload,
}

/// Progress events emitted during a run.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Run phase has changed
    PhaseChange(TestPhase),
    /// Ping sample taken
    PingSample {
        /// Sampled ping in milliseconds
        ping_ms: f64,
        /// Overall run progress, 0-100
        progress: f64,
    },
    /// Throughput sample taken
    ThroughputSample {
        /// Direction of the sample
        direction: ThroughputDirection,
        /// Sampled speed in Mbps
        speed_mbps: f64,
        /// Overall run progress, 0-100
        progress: f64,
    },
    /// Run completed and its result was recorded
    Completed {
        /// Jitter in milliseconds
        jitter_ms: f64,
        /// Packet loss percentage
        packet_loss_pct: f64,
        /// The history entry that was appended
        result: TestResult,
    },
    /// Run was cancelled before completing
    Cancelled,
    /// State returned to idle
    Reset,
}

/// Callback interface for progress updates.
///
/// Implementations must be non-blocking; they are invoked between
/// simulation steps.
pub trait ProgressCallback: Send + Sync {
    /// Called when a progress event occurs.
    fn on_progress(&self, event: ProgressEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_progress(&self, _event: ProgressEvent) {}
}
