//! Unified error type for the settings store, firewall wrapper, and process lifecycle.
//!
//! None of these errors crash the interactive loop: settings errors degrade to
//! defaults, firewall errors become a `false` toggle result, and only privilege or
//! platform errors decide the process exit code.

use std::time::Duration;

use crate::config;

/// Application-level error.
///
/// Each variant maps to a distinct failure domain. `kind()` yields the variant
/// name for log fields.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Settings file unreadable or malformed.
    #[error("{0}")]
    Config(String),

    /// Settings file could not be written.
    #[error("{0}")]
    Persist(String),

    /// Firewall command failed or produced an unexpected response.
    #[error("{0}")]
    Firewall(String),

    /// Firewall command exceeded its time budget.
    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    /// Elevated privileges missing or the elevation request failed.
    #[error("{0}")]
    Privilege(String),

    /// The current platform cannot host the firewall backend.
    #[error("{0}")]
    Unsupported(String),

    /// I/O and OS-level errors (filesystem, process spawning).
    #[error("{0}")]
    Io(String),

    /// Invalid or missing user input.
    #[error("{0}")]
    InvalidInput(String),
}

impl AppError {
    /// Returns the error kind as a string matching the variant name.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) => "Config",
            AppError::Persist(_) => "Persist",
            AppError::Firewall(_) => "Firewall",
            AppError::Timeout(_) => "Timeout",
            AppError::Privilege(_) => "Privilege",
            AppError::Unsupported(_) => "Unsupported",
            AppError::Io(_) => "Io",
            AppError::InvalidInput(_) => "InvalidInput",
        }
    }

    /// Process exit code used when this error ends the process.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Unsupported(_) => config::EXIT_UNSUPPORTED,
            AppError::Privilege(_) => config::EXIT_PRIVILEGE_REQUIRED,
            _ => config::EXIT_FATAL,
        }
    }
}

// ---- From implementations for ergonomic error conversion ----

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}
