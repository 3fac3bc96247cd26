//! TUI (Terminal User Interface) module for speedstream.
//!
//! Shows the network identity, live run gauges, the result history and the
//! server map, and maps key presses to run controls.

pub mod controller;
pub mod display_mode;
pub mod input;
pub mod renderer;
pub mod state;

pub use controller::TuiController;
pub use display_mode::DisplayMode;
pub use input::{spawn_key_reader, Command};
