//! Error types for lookups, storage and configuration.
//!
//! Most failures in speedstream are absorbed by a fallback value and never
//! reach the user. The ones that do (bad CLI input, an unwritable credential
//! file) are wrapped here with a clear message and an optional suggestion.

use std::error::Error;
use std::fmt;
use std::io;

/// Exit codes for the application.
pub mod exit_codes {
    /// Successful execution.
    pub const SUCCESS: i32 = 0;
    /// Network error (connection failed, timeout, etc.).
    pub const NETWORK_ERROR: i32 = 1;
    /// A lookup service answered with something unusable.
    pub const API_ERROR: i32 = 2;
    /// Configuration error (invalid arguments, missing config).
    pub const CONFIG_ERROR: i32 = 3;
    /// Credential storage could not be read or written.
    pub const STORAGE_ERROR: i32 = 4;
    /// The session was interrupted before every run finished.
    pub const INTERRUPTED: i32 = 130;
    /// Unknown/unexpected error.
    pub const UNKNOWN_ERROR: i32 = 99;
}

/// Categories of errors that can occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network connectivity issues.
    Network,
    /// DNS resolution failures.
    Dns,
    /// Request or discovery timeout.
    Timeout,
    /// A lookup service returned an error status.
    Api,
    /// A response could not be decoded.
    Parse,
    /// Device geolocation was refused or is unavailable.
    Permission,
    /// Invalid configuration or arguments.
    Config,
    /// Credential storage failures.
    Storage,
    /// Unknown or unexpected errors.
    Unknown,
}

impl ErrorKind {
    /// Get the exit code for this error kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorKind::Network => exit_codes::NETWORK_ERROR,
            ErrorKind::Dns => exit_codes::NETWORK_ERROR,
            ErrorKind::Timeout => exit_codes::NETWORK_ERROR,
            ErrorKind::Api => exit_codes::API_ERROR,
            ErrorKind::Parse => exit_codes::API_ERROR,
            ErrorKind::Permission => exit_codes::CONFIG_ERROR,
            ErrorKind::Config => exit_codes::CONFIG_ERROR,
            ErrorKind::Storage => exit_codes::STORAGE_ERROR,
            ErrorKind::Unknown => exit_codes::UNKNOWN_ERROR,
        }
    }

    /// Get a user-friendly description of this error kind.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorKind::Network => "Network error",
            ErrorKind::Dns => "DNS resolution error",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::Api => "Lookup service error",
            ErrorKind::Parse => "Response parse error",
            ErrorKind::Permission => "Permission denied",
            ErrorKind::Config => "Configuration error",
            ErrorKind::Storage => "Storage error",
            ErrorKind::Unknown => "Unknown error",
        }
    }
}

/// A user-friendly error type for speedstream operations.
#[derive(Debug)]
pub struct SpeedTestError {
    /// The kind of error.
    pub kind: ErrorKind,
    /// User-friendly error message.
    pub message: String,
    /// Optional suggestion for how to resolve the error.
    pub suggestion: Option<String>,
    /// The underlying error, if any.
    pub source: Option<Box<dyn Error + Send + Sync>>,
}

impl SpeedTestError {
    /// Create a new SpeedTestError.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), suggestion: None, source: None }
    }

    /// Add a suggestion for how to resolve the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add the underlying error source.
    pub fn with_source(
        mut self,
        source: impl Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        self.kind.exit_code()
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
            .with_suggestion("Check your internet connection and try again.")
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, message)
    }

    /// Create a permission error.
    pub fn permission(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permission, message)
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    /// The interactive screen could not drive the terminal.
    pub fn terminal(source: io::Error) -> Self {
        Self::new(ErrorKind::Unknown, "terminal error")
            .with_suggestion("Run with --batch to skip the interactive screen.")
            .with_source(source)
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, message).with_suggestion(
            "Check that the configuration directory is writable.",
        )
    }
}

impl fmt::Display for SpeedTestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.description(), self.message)?;

        if let Some(ref suggestion) = self.suggestion {
            write!(f, "\n  Suggestion: {}", suggestion)?;
        }

        Ok(())
    }
}

impl Error for SpeedTestError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}

impl From<reqwest::Error> for SpeedTestError {
    fn from(error: reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            ErrorKind::Timeout
        } else if error.is_decode() {
            ErrorKind::Parse
        } else if error.is_status() {
            ErrorKind::Api
        } else {
            classify_error(&error)
        };

        let mut speed_error = SpeedTestError::new(kind, error.to_string());
        speed_error.source = Some(Box::new(error));
        speed_error
    }
}

/// Classify an error into an ErrorKind.
///
/// An `io::Error` anywhere in the source chain decides by its kind;
/// otherwise well-known phrases in the message do.
pub fn classify_error(error: &(dyn Error + 'static)) -> ErrorKind {
    let mut current = Some(error);
    while let Some(e) = current {
        if let Some(kind) = e.downcast_ref::<io::Error>().and_then(io_error_kind)
        {
            return kind;
        }
        current = e.source();
    }

    classify_message(&error.to_string())
}

fn io_error_kind(error: &io::Error) -> Option<ErrorKind> {
    match error.kind() {
        io::ErrorKind::TimedOut => Some(ErrorKind::Timeout),
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected
        | io::ErrorKind::AddrNotAvailable => Some(ErrorKind::Network),
        io::ErrorKind::PermissionDenied => Some(ErrorKind::Permission),
        _ => None,
    }
}

const DNS_PHRASES: &[&str] =
    &["dns", "no such host", "failed to lookup address", "resolve"];
const TIMEOUT_PHRASES: &[&str] = &["timeout", "timed out", "deadline"];
const NETWORK_PHRASES: &[&str] = &[
    "connection refused",
    "connection reset",
    "network unreachable",
    "host unreachable",
    "no route",
    "error sending request",
];

fn classify_message(message: &str) -> ErrorKind {
    let message = message.to_lowercase();
    let mentions = |phrases: &[&str]| phrases.iter().any(|p| message.contains(p));

    if mentions(DNS_PHRASES) {
        ErrorKind::Dns
    } else if mentions(TIMEOUT_PHRASES) {
        ErrorKind::Timeout
    } else if mentions(NETWORK_PHRASES) {
        ErrorKind::Network
    } else {
        ErrorKind::Unknown
    }
}

/// Format an error for user display.
///
/// Includes the message and any available suggestion.
pub fn format_error_for_display(error: &SpeedTestError) -> String {
    let mut output = format!("Error: {}", error.message);

    if let Some(ref suggestion) = error.suggestion {
        output.push_str(&format!("\n\nSuggestion: {}", suggestion));
    }

    output
}
