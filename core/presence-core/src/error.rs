//! Error types for presence-core operations.

use std::path::PathBuf;

/// All errors that can occur in presence-core operations.
///
/// Only persistence writes and configuration loading surface errors to callers;
/// unreadable state and unresolvable identities degrade with a warning instead.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("Invalid reference timezone offset: {0}")]
    InvalidUtcOffset(String),

    #[error("Home directory not found")]
    HomeDirNotFound,

    // ─────────────────────────────────────────────────────────────────────
    // Identity Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Identity not found: {0}")]
    IdentityNotFound(String),

    #[error("Identity lookup failed: {name}: {details}")]
    LookupFailed { name: String, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // Persistence Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl TrackerError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        TrackerError::Io {
            context: context.into(),
            source,
        }
    }

    /// Stable short code used in daemon responses.
    pub fn code(&self) -> &'static str {
        match self {
            TrackerError::ConfigMalformed { .. } | TrackerError::InvalidUtcOffset(_) => {
                "config_error"
            }
            TrackerError::HomeDirNotFound => "home_not_found",
            TrackerError::IdentityNotFound(_) => "identity_not_found",
            TrackerError::LookupFailed { .. } => "lookup_failed",
            TrackerError::Io { .. } | TrackerError::Json { .. } => "persist_failed",
        }
    }
}

/// Convenience type alias for Results using TrackerError.
pub type Result<T> = std::result::Result<T, TrackerError>;
