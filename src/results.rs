//! Session report for non-interactive output.
//!
//! Collects the resolved network record, every completed run and the map
//! panel into one serializable structure, printed either as JSON
//! (`--json`) or as a colored plain-text summary (batch mode).

use chrono::{DateTime, Utc};
use colored::{ColoredString, Colorize};
use serde::Serialize;

use crate::errors::SpeedTestError;
use crate::map::{LocationOrigin, MapView};
use crate::network::NetworkInfo;
use crate::run::{Grade, HistorySummary, ResultHistory, TestResult, TestRunState};

/// One completed run with the metrics not kept in history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    #[serde(flatten)]
    pub result: TestResult,
    /// Jitter in milliseconds
    pub jitter_ms: f64,
    /// Packet loss percentage
    pub packet_loss_pct: f64,
}

impl RunReport {
    /// Pair a result with the final run state it came from.
    pub fn from_state(result: TestResult, state: &TestRunState) -> Self {
        Self {
            result,
            jitter_ms: state.jitter,
            packet_loss_pct: state.packet_loss,
        }
    }
}

/// Everything a batch session produced.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    /// When the report was built
    pub timestamp: DateTime<Utc>,
    pub network: NetworkInfo,
    /// Runs in the order they completed
    pub runs: Vec<RunReport>,
    /// Summary of the retained history (newest five runs)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<HistorySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map: Option<MapView>,
    /// The session was interrupted before every requested run finished
    pub cancelled: bool,
}

impl SessionReport {
    pub fn new(
        network: NetworkInfo,
        runs: Vec<RunReport>,
        history: &ResultHistory,
        map: Option<MapView>,
        cancelled: bool,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            network,
            runs,
            summary: history.summary(),
            map,
            cancelled,
        }
    }

    pub fn to_json(&self) -> Result<String, SpeedTestError> {
        serde_json::to_string_pretty(self).map_err(|e| {
            SpeedTestError::parse("could not encode the session report")
                .with_source(e)
        })
    }

    /// Warning to surface next to the report, if the record is synthesized.
    pub fn warning(&self) -> Option<&'static str> {
        self.network.notice()
    }

    /// Multi-line colored summary.
    pub fn to_text(&self) -> String {
        let network = &self.network;
        let mut lines = vec![
            format!("{} {}", "Your IP:".bold().white(), network.public_ip.bright_blue()),
            format!("{} {}", "Local IP:".bold().white(), network.local_ip.bright_blue()),
            format!("{} {}", "ISP:".bold().white(), network.isp.bright_blue()),
            format!(
                "{} {}",
                "Location:".bold().white(),
                network.location.label().bright_blue()
            ),
            format!(
                "{} {} ({})",
                "Connection:".bold().white(),
                network.connection_type.bright_blue(),
                network.network_interface
            ),
            format!(
                "{} {}",
                "Source:".bold().white(),
                network.source.label().dimmed()
            ),
        ];

        if let Some(warning) = self.warning() {
            lines.push(format!("{} {}", "Warning:".bold().yellow(), warning.yellow()));
        }

        for (index, run) in self.runs.iter().enumerate() {
            let result = &run.result;
            lines.push(String::new());
            lines.push(format!(
                "{} {} {}",
                format!("Run {}", index + 1).bold().white(),
                "Grade".bold().white(),
                colored_grade(result.grade)
            ));
            lines.push(format!(
                "{} {}",
                "Download speed:".bold().white(),
                format!("{:.2} Mbps", result.download_speed).bright_cyan()
            ));
            lines.push(format!(
                "{} {}",
                "Upload speed:".bold().white(),
                format!("{:.2} Mbps", result.upload_speed).bright_cyan()
            ));
            lines.push(format!("{} {:.2} ms", "Ping:".bold().white(), result.ping));
            lines.push(format!(
                "{} {:.2} ms",
                "Jitter:".bold().white(),
                run.jitter_ms
            ));
            lines.push(format!(
                "{} {:.2}%",
                "Packet loss:".bold().white(),
                run.packet_loss_pct
            ));
        }

        if let Some(ref summary) = self.summary {
            lines.push(String::new());
            lines.push(format!(
                "{} {} runs, avg {:.2}/{:.2} Mbps, median ping {:.2} ms, best {}",
                "History:".bold().white(),
                summary.runs,
                summary.mean_download_mbps,
                summary.mean_upload_mbps,
                summary.median_ping_ms,
                colored_grade(summary.best_grade)
            ));
        }

        if let Some(ref map) = self.map {
            lines.push(String::new());
            lines.push(map_line(map));
        }

        if self.cancelled {
            lines.push(String::new());
            lines.push("Session interrupted.".yellow().to_string());
        }

        lines.join("\n")
    }
}

fn colored_grade(grade: Grade) -> ColoredString {
    let text = grade.as_str().bold();
    match grade {
        Grade::A => text.green(),
        Grade::B => text.cyan(),
        Grade::C => text.yellow(),
        Grade::D | Grade::F => text.red(),
    }
}

fn map_line(map: &MapView) -> String {
    match map {
        MapView::SetupRequired => format!(
            "{} {}",
            "Map:".bold().white(),
            "token required (pass --map-token)".yellow()
        ),
        MapView::Ready { origin, .. } => {
            let origin = match origin {
                LocationOrigin::Device => "device location",
                LocationOrigin::Fallback => "default location",
            };
            match map.nearest() {
                Some(route) => format!(
                    "{} nearest server {} ({:.0} km, {} ms) from {}",
                    "Map:".bold().white(),
                    route.server.name.bright_blue(),
                    route.distance_km,
                    route.server.ping_ms,
                    origin
                ),
                None => format!("{} {}", "Map:".bold().white(), origin),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{routes_from, FALLBACK_LOCATION};
    use crate::network::InfoSource;
    use chrono::TimeZone;

    fn result(id: &str, download: f64, grade: Grade) -> TestResult {
        TestResult::new(
            id.to_string(),
            Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
            download,
            34.0,
            25.0,
            grade,
        )
    }

    fn network() -> NetworkInfo {
        let mut network = NetworkInfo::placeholder(true);
        network.public_ip = "203.0.113.7".to_string();
        network.isp = "Example ISP".to_string();
        network.source = InfoSource::Lookup { provider: "ipapi.co".into() };
        network
    }

    fn report(cancelled: bool) -> SessionReport {
        let first = result("1", 55.0, Grade::C);
        let second = result("2", 90.0, Grade::A);
        let mut history = ResultHistory::new();
        history.push(first.clone());
        history.push(second.clone());

        let runs = vec![
            RunReport { result: first, jitter_ms: 12.5, packet_loss_pct: 1.0 },
            RunReport { result: second, jitter_ms: 8.0, packet_loss_pct: 0.0 },
        ];

        SessionReport::new(
            network(),
            runs,
            &history,
            Some(MapView::Ready {
                user_location: FALLBACK_LOCATION,
                origin: LocationOrigin::Fallback,
                routes: routes_from(FALLBACK_LOCATION),
            }),
            cancelled,
        )
    }

    #[test]
    fn test_run_report_from_state() {
        let mut state = TestRunState::new();
        state.jitter = 7.0;
        state.packet_loss = 0.5;

        let run = RunReport::from_state(result("1", 55.0, Grade::C), &state);

        assert_eq!(run.jitter_ms, 7.0);
        assert_eq!(run.packet_loss_pct, 0.5);
    }

    #[test]
    fn test_session_report_serialization() {
        let json = report(false).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["network"]["public_ip"], "203.0.113.7");
        assert_eq!(value["network"]["source"]["kind"], "lookup");
        assert_eq!(value["runs"].as_array().unwrap().len(), 2);
        // The result fields are flattened next to jitter and loss.
        assert_eq!(value["runs"][0]["download_speed"], 55.0);
        assert_eq!(value["runs"][0]["jitter_ms"], 12.5);
        assert_eq!(value["summary"]["runs"], 2);
        assert_eq!(value["summary"]["best_grade"], "A");
        assert_eq!(value["map"]["status"], "ready");
        assert_eq!(value["cancelled"], false);
    }

    #[test]
    fn test_empty_session_skips_summary_and_map() {
        let report = SessionReport::new(
            network(),
            Vec::new(),
            &ResultHistory::new(),
            None,
            true,
        );

        let json = report.to_json().unwrap();

        assert!(!json.contains("\"summary\""));
        assert!(!json.contains("\"map\""));
        assert!(json.contains("\"cancelled\": true"));
    }

    #[test]
    fn test_text_report_contents() {
        let text = report(true).to_text();

        assert!(text.contains("203.0.113.7"));
        assert!(text.contains("Example ISP"));
        assert!(text.contains("55.00 Mbps"));
        assert!(text.contains("12.50 ms"));
        assert!(text.contains("1.00%"));
        assert!(text.contains("New York"));
        assert!(text.contains("default location"));
        assert!(text.contains("Session interrupted."));
    }

    #[test]
    fn test_mock_network_report_carries_warning() {
        let mut network = network();
        network.source = InfoSource::Mock;
        let report =
            SessionReport::new(network, Vec::new(), &ResultHistory::new(), None, false);

        assert_eq!(report.warning(), Some(crate::network::MOCK_NOTICE));
        assert!(report.to_text().contains("Warning:"));
        assert!(report.to_text().contains("Network lookups failed"));
    }

    #[test]
    fn test_resolved_network_report_has_no_warning() {
        let report = report(false);

        assert_eq!(report.warning(), None);
        assert!(!report.to_text().contains("Warning:"));
    }

    #[test]
    fn test_text_report_setup_required_map() {
        let report = SessionReport::new(
            network(),
            Vec::new(),
            &ResultHistory::new(),
            Some(MapView::SetupRequired),
            false,
        );

        assert!(report.to_text().contains("token required"));
    }
}
