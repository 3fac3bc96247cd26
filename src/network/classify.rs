//! Connection classification from the platform hint.
//!
//! The label is derived, never measured. Without a hint the label is drawn
//! at random from [`MOCK_CONNECTION_LABELS`].

use serde::Serialize;
use std::fmt;

use super::ConnectionHint;
use crate::random::RandomSource;

/// Labels used when no hint is available.
pub const MOCK_CONNECTION_LABELS: [&str; 5] =
    ["WiFi", "Mobile 4G", "Mobile 3G", "Ethernet", "Cable"];

/// Downlink above this is reported as fiber.
pub const FIBER_DOWNLINK_MBPS: f64 = 50.0;

/// Download estimate drawn when the hint has no downlink: `r·100 + 20`.
const ESTIMATE_SPREAD_MBPS: f64 = 100.0;
const ESTIMATE_FLOOR_MBPS: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionClass {
    Mobile4G,
    Mobile3G,
    /// 2g and slow-2g
    SlowMobile,
    Fiber,
    Broadband,
}

impl ConnectionClass {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionClass::Mobile4G => "Mobile 4G",
            ConnectionClass::Mobile3G => "Mobile 3G",
            ConnectionClass::SlowMobile => "Mobile 2G",
            ConnectionClass::Fiber => "Fiber/Cable",
            ConnectionClass::Broadband => "Broadband",
        }
    }
}

impl fmt::Display for ConnectionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classify a hint by its effective type.
///
/// The downlink only decides between fiber and broadband for an effective
/// type outside the cellular set; a hint with no effective type is
/// broadband whatever its downlink.
pub fn classify(hint: &ConnectionHint, estimated_downlink: f64) -> ConnectionClass {
    let effective = hint
        .effective_type
        .as_deref()
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty());

    match effective.as_deref() {
        None => ConnectionClass::Broadband,
        Some("4g") => ConnectionClass::Mobile4G,
        Some("3g") => ConnectionClass::Mobile3G,
        Some("2g") | Some("slow-2g") => ConnectionClass::SlowMobile,
        Some(_) if estimated_downlink > FIBER_DOWNLINK_MBPS => {
            ConnectionClass::Fiber
        }
        Some(_) => ConnectionClass::Broadband,
    }
}

/// Downlink from the hint, or a random estimate in `[20, 120)`.
pub fn estimate_download(
    hint: Option<&ConnectionHint>,
    random: &mut dyn RandomSource,
) -> f64 {
    match hint.and_then(|h| h.downlink_mbps).filter(|d| *d > 0.0) {
        Some(downlink) => downlink,
        None => random.next_f64() * ESTIMATE_SPREAD_MBPS + ESTIMATE_FLOOR_MBPS,
    }
}

/// Display label for the connection.
pub fn connection_label(
    hint: Option<&ConnectionHint>,
    estimated_downlink: f64,
    random: &mut dyn RandomSource,
) -> String {
    match hint.filter(|h| !h.is_empty()) {
        Some(hint) => classify(hint, estimated_downlink).label().to_string(),
        None => {
            let index = random.index(MOCK_CONNECTION_LABELS.len());
            MOCK_CONNECTION_LABELS[index].to_string()
        }
    }
}
