//! TUI rendering logic using ratatui.
//!
//! Handles the actual rendering of the TUI using ratatui widgets,
//! including layout, formatting, and color coding.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame,
};

use super::state::{ErrorInfo, TuiState};
use crate::map::{LocationOrigin, MapView};
use crate::run::{Grade, TestPhase};

/// Get color for speed value based on thresholds.
///
/// - Green: >= 50 Mbps (fast)
/// - Yellow: 20-50 Mbps (moderate)
/// - Red: < 20 Mbps (slow)
pub fn speed_color(speed_mbps: f64) -> Color {
    if speed_mbps >= 50.0 {
        Color::Green
    } else if speed_mbps >= 20.0 {
        Color::Yellow
    } else {
        Color::Red
    }
}

/// Lower is better: green under 30 ms, yellow under 60 ms.
pub fn ping_color(ping_ms: f64) -> Color {
    if ping_ms < 30.0 {
        Color::Green
    } else if ping_ms < 60.0 {
        Color::Yellow
    } else {
        Color::Red
    }
}

pub fn grade_color(grade: Grade) -> Color {
    match grade {
        Grade::A => Color::Green,
        Grade::B => Color::Cyan,
        Grade::C => Color::Yellow,
        Grade::D => Color::LightRed,
        Grade::F => Color::Red,
    }
}

/// Format speed value with 2 decimal places.
pub fn format_speed(speed_mbps: f64) -> String {
    format!("{:.2} Mbps", speed_mbps)
}

/// Format latency value with 2 decimal places.
pub fn format_latency(latency_ms: f64) -> String {
    format!("{:.2} ms", latency_ms)
}

/// Minimal mode threshold in columns.
const MINIMAL_MODE_THRESHOLD: u16 = 60;

/// Check if minimal mode should be used based on terminal width.
pub fn is_minimal_mode(width: u16) -> bool {
    width < MINIMAL_MODE_THRESHOLD
}

const KEY_HELP: &str = "[s] start  [r] reset  [f] refresh  [q] quit";

fn label(text: &str) -> Span<'static> {
    Span::styled(
        text.to_string(),
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
    )
}

fn value(text: impl Into<String>, color: Color) -> Span<'static> {
    Span::styled(text.into(), Style::default().fg(color))
}

/// Render the TUI to the terminal.
///
/// This is the main entry point for rendering. It determines whether
/// to use normal or minimal mode based on terminal width.
pub fn render_frame(frame: &mut Frame, state: &TuiState) {
    if is_minimal_mode(frame.area().width) {
        render_minimal_frame(frame, state);
    } else {
        render_normal_frame(frame, state);
    }
}

/// Render the normal (full-width) TUI layout.
fn render_normal_frame(frame: &mut Frame, state: &TuiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6), // Network
            Constraint::Length(2), // Current phase
            Constraint::Min(8),    // Run + side panels
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    render_network(frame, chunks[0], state);
    render_phase_indicator(frame, chunks[1], state);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(chunks[2]);

    render_progress_or_results(frame, body[0], state);

    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(4), Constraint::Length(5)])
        .split(body[1]);

    render_history(frame, side[0], state);
    render_map(frame, side[1], state);
    render_status_bar(frame, chunks[3], state);
}

/// Render the minimal mode layout for narrow terminals.
pub fn render_minimal_frame(frame: &mut Frame, state: &TuiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Compact network
            Constraint::Length(2), // Phase + gauge
            Constraint::Min(2),    // Metrics/results
        ])
        .split(frame.area());

    render_minimal_network(frame, chunks[0], state);
    render_minimal_phase(frame, chunks[1], state);
    render_minimal_results(frame, chunks[2], state);
}

/// Render the network identity panel.
pub fn render_network(frame: &mut Frame, area: Rect, state: &TuiState) {
    let block = Block::default()
        .title(" Network ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let network = &state.network;
    let (status, status_color) = if network.is_online {
        ("Online", Color::Green)
    } else {
        ("Offline", Color::Red)
    };

    let lines = vec![
        Line::from(vec![
            label("IP: "),
            value(network.public_ip.as_str(), Color::Cyan),
            Span::raw("  "),
            label("Local: "),
            value(network.local_ip.as_str(), Color::Cyan),
        ]),
        Line::from(vec![
            label("ISP: "),
            value(network.isp.as_str(), Color::Cyan),
            Span::raw("  "),
            label("Status: "),
            value(status, status_color),
        ]),
        Line::from(vec![label("Location: "), value(state.server_label(), Color::Cyan)]),
        Line::from(vec![
            label("Connection: "),
            value(
                format!(
                    "{} ({})",
                    network.connection_type, network.network_interface
                ),
                Color::Cyan,
            ),
            Span::raw("  "),
            value(network.source.label(), Color::DarkGray),
        ]),
    ];

    frame.render_widget(Paragraph::new(lines), inner);
}

/// Render the current test phase indicator.
pub fn render_phase_indicator(frame: &mut Frame, area: Rect, state: &TuiState) {
    let phase = state.run.phase;
    let phase_text = match phase {
        TestPhase::Idle => format!("● {}", phase.label()),
        TestPhase::Complete => format!("✓ {}", phase.label()),
        _ => format!("▶ {}", phase.label()),
    };

    let style = if state.run.is_running() {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else if phase == TestPhase::Complete {
        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White)
    };

    let block = Block::default().borders(Borders::BOTTOM);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    frame.render_widget(Paragraph::new(phase_text).style(style), inner);
}

/// Render the live metrics or the final results depending on phase.
pub fn render_progress_or_results(
    frame: &mut Frame,
    area: Rect,
    state: &TuiState,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Progress bar
            Constraint::Length(1),
            Constraint::Min(4), // Metrics
        ])
        .split(area);

    let percent = state.run.progress.clamp(0.0, 100.0) as u16;
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::NONE))
        .gauge_style(Style::default().fg(Color::Cyan))
        .percent(percent)
        .label(format!("{}%", percent));
    frame.render_widget(gauge, chunks[0]);

    match (&state.last_result, state.run.phase) {
        (Some(_), TestPhase::Complete) => {
            render_final_results(frame, chunks[2], state)
        }
        _ => render_live_metrics(frame, chunks[2], state),
    }
}

/// Ping, download and upload as they are sampled.
fn render_live_metrics(frame: &mut Frame, area: Rect, state: &TuiState) {
    let run = &state.run;
    let active = |phase: TestPhase| run.phase == phase;
    let marker = |phase: TestPhase| if active(phase) { "▶ " } else { "  " };

    let lines = vec![
        Line::from(vec![
            Span::raw(marker(TestPhase::Ping)),
            label("Ping: "),
            value(format_latency(run.ping), ping_color(run.ping)),
        ]),
        Line::from(vec![
            Span::raw(marker(TestPhase::Download)),
            label("Download: "),
            value(format_speed(run.download_speed), speed_color(run.download_speed)),
        ]),
        Line::from(vec![
            Span::raw(marker(TestPhase::Upload)),
            label("Upload: "),
            value(format_speed(run.upload_speed), speed_color(run.upload_speed)),
        ]),
    ];

    frame.render_widget(Paragraph::new(lines), area);
}

/// Render final results summary.
fn render_final_results(frame: &mut Frame, area: Rect, state: &TuiState) {
    let Some(ref result) = state.last_result else {
        return;
    };

    let lines = vec![
        Line::from(vec![
            label("Grade: "),
            Span::styled(
                result.grade.to_string(),
                Style::default()
                    .fg(grade_color(result.grade))
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            value(result.grade.description(), grade_color(result.grade)),
        ]),
        Line::from(vec![
            label("Download: "),
            value(
                format_speed(result.download_speed),
                speed_color(result.download_speed),
            ),
        ]),
        Line::from(vec![
            label("Upload: "),
            value(
                format_speed(result.upload_speed),
                speed_color(result.upload_speed),
            ),
        ]),
        Line::from(vec![
            label("Ping: "),
            value(format_latency(result.ping), ping_color(result.ping)),
            Span::raw("  "),
            label("Jitter: "),
            value(format_latency(state.run.jitter), Color::White),
            Span::raw("  "),
            label("Loss: "),
            value(format!("{:.2}%", state.run.packet_loss), Color::White),
        ]),
    ];

    frame.render_widget(Paragraph::new(lines), area);
}

/// Render the newest-first result history.
pub fn render_history(frame: &mut Frame, area: Rect, state: &TuiState) {
    let block = Block::default()
        .title(" History ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if state.history.is_empty() {
        frame.render_widget(
            Paragraph::new("No completed runs yet")
                .style(Style::default().fg(Color::DarkGray)),
            inner,
        );
        return;
    }

    let lines: Vec<Line> = state
        .history
        .entries()
        .iter()
        .map(|result| {
            Line::from(vec![
                value(
                    result.timestamp.format("%H:%M:%S").to_string(),
                    Color::DarkGray,
                ),
                Span::raw(" "),
                Span::styled(
                    result.grade.to_string(),
                    Style::default()
                        .fg(grade_color(result.grade))
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw(format!(
                    " ↓{:.1} ↑{:.1} {:.0}ms",
                    result.download_speed, result.upload_speed, result.ping
                )),
            ])
        })
        .collect();

    frame.render_widget(Paragraph::new(lines), inner);
}

/// Render the map panel: setup prompt or nearest servers.
pub fn render_map(frame: &mut Frame, area: Rect, state: &TuiState) {
    let Some(ref map) = state.map else {
        return;
    };

    let block = Block::default()
        .title(" Servers ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let lines = match map {
        MapView::SetupRequired => vec![
            Line::from(value("Map token required", Color::Yellow)),
            Line::from(value("Run with --map-token <TOKEN>", Color::DarkGray)),
        ],
        MapView::Ready { user_location, origin, routes } => {
            let origin_text = match origin {
                LocationOrigin::Device => "device",
                LocationOrigin::Fallback => "default",
            };
            let mut lines = vec![Line::from(value(
                format!(
                    "You: {:.2}, {:.2} ({})",
                    user_location.latitude, user_location.longitude, origin_text
                ),
                Color::Cyan,
            ))];
            lines.extend(routes.iter().take(2).map(|route| {
                Line::from(Span::raw(format!(
                    "{} {:.0} km {}ms",
                    route.server.name, route.distance_km, route.server.ping_ms
                )))
            }));
            lines
        }
    };

    frame.render_widget(Paragraph::new(lines), inner);
}

/// Render the status bar at the bottom.
pub fn render_status_bar(frame: &mut Frame, area: Rect, state: &TuiState) {
    let paragraph = if let Some(ref error) = state.error {
        Paragraph::new(error_text(error))
            .style(Style::default().fg(Color::Red).add_modifier(Modifier::BOLD))
    } else if let Some(ref notice) = state.notice {
        Paragraph::new(format!("{}  {}", notice, KEY_HELP))
            .style(Style::default().fg(Color::Yellow))
    } else if state.resolving {
        Paragraph::new("Detecting network...")
            .style(Style::default().fg(Color::DarkGray))
    } else {
        Paragraph::new(KEY_HELP).style(Style::default().fg(Color::DarkGray))
    };

    frame.render_widget(paragraph, area);
}

fn error_text(error: &ErrorInfo) -> String {
    match error.suggestion {
        Some(ref suggestion) => {
            format!("Error: {} ({})", error.message, suggestion)
        }
        None => format!("Error: {}", error.message),
    }
}

// --- Minimal mode rendering functions ---

/// Render compact network line for minimal mode.
fn render_minimal_network(frame: &mut Frame, area: Rect, state: &TuiState) {
    let text = if state.resolving {
        "Detecting...".to_string()
    } else {
        format!("{} | {}", state.network.public_ip, state.network.isp)
    };

    frame.render_widget(
        Paragraph::new(text).style(Style::default().fg(Color::Cyan)),
        area,
    );
}

/// Render compact phase indicator for minimal mode.
fn render_minimal_phase(frame: &mut Frame, area: Rect, state: &TuiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(area);

    let percent = state.run.progress.clamp(0.0, 100.0) as u16;
    let phase_text = match state.run.phase {
        TestPhase::Idle => "● Ready".to_string(),
        TestPhase::Complete => "✓ Done".to_string(),
        phase => format!("▶ {} {}%", phase.label(), percent),
    };

    let style = if state.run.phase == TestPhase::Complete {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::Yellow)
    };

    frame.render_widget(Paragraph::new(phase_text).style(style), chunks[0]);

    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(Color::Cyan))
        .percent(percent);
    frame.render_widget(gauge, chunks[1]);
}

/// Render compact results for minimal mode.
fn render_minimal_results(frame: &mut Frame, area: Rect, state: &TuiState) {
    if let Some(ref error) = state.error {
        let paragraph = Paragraph::new(format!("Error: {}", error.message))
            .style(Style::default().fg(Color::Red));
        frame.render_widget(paragraph, area);
        return;
    }

    let run = &state.run;
    let mut lines = vec![Line::from(vec![
        value(format!("↓{:.1}", run.download_speed), speed_color(run.download_speed)),
        Span::raw(" "),
        value(format!("↑{:.1}", run.upload_speed), speed_color(run.upload_speed)),
        Span::raw(" "),
        value(format!("{:.0}ms", run.ping), ping_color(run.ping)),
    ])];

    if let (Some(result), TestPhase::Complete) = (&state.last_result, run.phase) {
        lines.push(Line::from(Span::styled(
            format!("Grade {}", result.grade),
            Style::default().fg(grade_color(result.grade)),
        )));
    }

    frame.render_widget(Paragraph::new(lines), area);
}
