//! Keyboard input for the interactive screen.
//!
//! Key events are read on a blocking thread and forwarded as [`Command`]s
//! over an unbounded channel, so the async UI loop never blocks on stdin.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use log::debug;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// User intent decoded from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start a run, or test again from the results screen
    Start,
    /// Return to the idle zero state, cancelling an active run
    Reset,
    /// Re-resolve the network record
    Refresh,
    Quit,
}

impl Command {
    pub fn from_key(key: KeyEvent) -> Option<Command> {
        if key.kind != KeyEventKind::Press {
            return None;
        }

        match (key.modifiers, key.code) {
            (KeyModifiers::CONTROL, KeyCode::Char('c')) => Some(Command::Quit),
            (_, KeyCode::Char('q')) | (_, KeyCode::Esc) => Some(Command::Quit),
            (_, KeyCode::Char('s')) | (_, KeyCode::Enter) => Some(Command::Start),
            (_, KeyCode::Char('r')) => Some(Command::Reset),
            (_, KeyCode::Char('f')) => Some(Command::Refresh),
            _ => None,
        }
    }
}

/// Read keys until `stop` is set or the receiver is dropped.
pub fn spawn_key_reader(
    tx: UnboundedSender<Command>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        while !stop.load(Ordering::SeqCst) {
            // Poll with a short timeout so `stop` is noticed promptly.
            match event::poll(POLL_INTERVAL) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    debug!("Key polling failed: {}", e);
                    break;
                }
            }

            let Ok(Event::Key(key)) = event::read() else {
                continue;
            };

            if let Some(command) = Command::from_key(key) {
                if tx.send(command).is_err() {
                    break;
                }
            }
        }
    })
}
