// ── Core error types ──
//
// Errors surfaced by softap-core to its callers. Remote-call failures
// inside the lifecycle manager never become errors (they are logged and
// reported as `false`); these cover command rejection, validation and
// local file I/O.

use std::path::PathBuf;

use thiserror::Error;

use crate::model::StartFailure;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Soft AP failed to start: {reason}")]
    StartFailed { reason: StartFailure },

    #[error("Soft AP is not started")]
    NotStarted,

    #[error("Soft AP is already started")]
    AlreadyStarted,

    #[error("Controller is stopped")]
    ControllerStopped,

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Invalid MAC address: {value}")]
    InvalidMac { value: String },

    #[error("Client not found: {mac}")]
    ClientNotFound { mac: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── Remote errors ────────────────────────────────────────────────
    #[error("hostapd rejected {operation}")]
    RemoteRejected { operation: String },

    #[error("Transport error: {0}")]
    Transport(#[from] softap_hal::TransportError),

    // ── Storage errors ───────────────────────────────────────────────
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Settings error: {message}")]
    Settings { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
