//! Run state management.
//!
//! Holds the metrics a presentation layer renders while a run is in
//! progress, and folds progress events into them.

use serde::Serialize;

use super::progress::{ProgressEvent, TestPhase, ThroughputDirection};

/// Observable state of the simulated run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestRunState {
    /// Current phase
    pub phase: TestPhase,
    /// Overall progress, 0-100
    pub progress: f64,
    /// Latest download speed in Mbps
    pub download_speed: f64,
    /// Latest upload speed in Mbps
    pub upload_speed: f64,
    /// Latest ping in milliseconds
    pub ping: f64,
    /// Jitter in milliseconds, set on completion
    pub jitter: f64,
    /// Packet loss percentage, set on completion
    pub packet_loss: f64,
}

impl Default for TestRunState {
    fn default() -> Self {
        Self {
            phase: TestPhase::Idle,
            progress: 0.0,
            download_speed: 0.0,
            upload_speed: 0.0,
            ping: 0.0,
            jitter: 0.0,
            packet_loss: 0.0,
        }
    }
}

impl TestRunState {
    /// Create the idle zero state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return to the idle zero state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_running(&self) -> bool {
        self.phase.is_active()
    }

    /// Whether this is exactly the idle zero state.
    #[cfg(test)]
    pub fn is_idle_zero(&self) -> bool {
        *self == Self::default()
    }

    /// Advance progress, never moving it backwards.
    fn advance_progress(&mut self, progress: f64) {
        let clamped = progress.clamp(0.0, 100.0);
        if clamped > self.progress {
            self.progress = clamped;
        }
    }

    /// Update state from a progress event.
    pub fn update_from_event(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::PhaseChange(phase) => {
                if *phase == TestPhase::Ping {
                    // A new run starts from zero progress.
                    self.reset();
                }
                self.phase = *phase;
            }
            ProgressEvent::PingSample { ping_ms, progress } => {
                self.ping = ping_ms.max(0.0);
                self.advance_progress(*progress);
            }
            ProgressEvent::ThroughputSample {
                direction,
                speed_mbps,
                progress,
            } => {
                let speed = speed_mbps.max(0.0);
                match direction {
                    ThroughputDirection::Download => {
                        self.download_speed = speed
                    }
                    ThroughputDirection::Upload => self.upload_speed = speed,
                }
                self.advance_progress(*progress);
            }
            ProgressEvent::Completed { jitter_ms, packet_loss_pct, .. } => {
                self.jitter = jitter_ms.max(0.0);
                self.packet_loss = packet_loss_pct.max(0.0);
                self.advance_progress(100.0);
                self.phase = TestPhase::Complete;
            }
            ProgressEvent::Cancelled | ProgressEvent::Reset => {
                self.reset();
            }
        }
    }
}
